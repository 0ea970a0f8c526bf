use super::io::{column_names, float_values, text_values};
use super::stats::sample_variance;
use super::types::{ColumnKind, ColumnStats, TableProfile};
use crate::error::{Result, TheftcastError};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

/// Assigns a kind to every column and records its statistics.
///
/// Text columns whose non-missing values all parse as numbers are converted
/// to `Float64` in place, so later stages see one dtype per kind.
pub fn profile(df: &mut DataFrame) -> Result<TableProfile> {
    if df.height() == 0 || df.width() == 0 {
        return Err(TheftcastError::EmptyInput(format!(
            "table has {} row(s) and {} column(s)",
            df.height(),
            df.width()
        )));
    }

    let mut columns = Vec::with_capacity(df.width());
    for name in column_names(df) {
        let kind = classify_column(df, &name)?;
        let stats = column_stats(df, &name, kind)?;
        debug!(
            "Profiled '{}' as {} ({} missing)",
            name, stats.kind, stats.missing
        );
        columns.push(stats);
    }

    let profile = TableProfile {
        row_count: df.height(),
        columns,
    };
    info!(
        "Profiled {} columns: {} numeric, {} categorical",
        profile.column_count(),
        profile.names_of_kind(ColumnKind::Numeric).len(),
        profile.names_of_kind(ColumnKind::Categorical).len()
    );
    Ok(profile)
}

/// Recomputes statistics for the columns still present, keeping the kinds
/// recorded in `previous` (encoded categoricals stay categorical).
pub fn reprofile(df: &DataFrame, previous: &TableProfile) -> Result<TableProfile> {
    let mut columns = Vec::with_capacity(df.width());
    for name in column_names(df) {
        let kind = previous.kind_of(&name).unwrap_or(ColumnKind::Numeric);
        columns.push(column_stats(df, &name, kind)?);
    }
    Ok(TableProfile {
        row_count: df.height(),
        columns,
    })
}

pub fn column_stats(df: &DataFrame, name: &str, kind: ColumnKind) -> Result<ColumnStats> {
    match kind {
        ColumnKind::Numeric => {
            let values = float_values(df, name)?;
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            Ok(ColumnStats {
                name: name.to_owned(),
                kind,
                count: values.len(),
                missing: values.len() - present.len(),
                cardinality: None,
                variance: sample_variance(&present),
            })
        }
        ColumnKind::Categorical => {
            let values = text_values(df, name)?;
            let distinct: HashSet<&str> = values.iter().flatten().map(String::as_str).collect();
            let missing = values.iter().filter(|v| v.is_none()).count();
            Ok(ColumnStats {
                name: name.to_owned(),
                kind,
                count: values.len(),
                missing,
                cardinality: Some(distinct.len()),
                variance: None,
            })
        }
    }
}

/// Decides the kind of one column, casting numeric text to `Float64`.
fn classify_column(df: &mut DataFrame, name: &str) -> Result<ColumnKind> {
    let dtype = df.column(name)?.dtype().clone();
    if dtype.is_primitive_numeric() {
        if dtype != DataType::Float64 {
            let cast = df
                .column(name)?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            df.with_column(cast)?;
        }
        return Ok(ColumnKind::Numeric);
    }
    if dtype != DataType::String {
        return Ok(ColumnKind::Categorical);
    }

    let values = text_values(df, name)?;
    let mut parsed = Vec::with_capacity(values.len());
    for value in &values {
        match value {
            None => parsed.push(None),
            Some(text) => match text.trim().parse::<f64>() {
                Ok(x) => parsed.push(Some(x)),
                Err(_) => return Ok(ColumnKind::Categorical),
            },
        }
    }

    df.with_column(Series::new(name.into(), parsed))?;
    Ok(ColumnKind::Numeric)
}
