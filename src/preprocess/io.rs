use crate::error::{Result, TheftcastError};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Reads a CSV with every column as text; the profiler decides kinds later.
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .finish()?
        .collect()?;
    info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    CsvWriter::new(file).include_header(true).finish(df)?;
    Ok(())
}

/// Text view of a column; empty strings count as missing.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series();
    let series = if series.dtype() == &DataType::String {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.filter(|s| !s.is_empty()).map(str::to_owned))
        .collect())
}

/// Float view of a column; values that fail to cast are missing.
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Removes rows whose label is null or one of `excluded`.
///
/// Returns the filtered table and the number of rows removed.
pub fn filter_labels(
    df: &DataFrame,
    label_column: &str,
    excluded: &[String],
) -> Result<(DataFrame, usize)> {
    if !has_column(df, label_column) {
        return Err(TheftcastError::MissingLabelColumn(label_column.to_owned()));
    }
    let labels = text_values(df, label_column)?;
    let keep: Vec<bool> = labels
        .iter()
        .map(|v| match v {
            Some(label) => !excluded.iter().any(|e| e == label.trim()),
            None => false,
        })
        .collect();
    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return Ok((df.clone(), 0));
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let filtered = df.filter(&mask)?;
    info!("Removed {removed} row(s) with excluded or missing '{label_column}' values");
    Ok((filtered, removed))
}

/// Drops each named column that is present; returns the ones actually dropped.
pub fn drop_columns(df: &mut DataFrame, names: &[String]) -> Result<Vec<String>> {
    let mut dropped = Vec::new();
    for name in names {
        if has_column(df, name) {
            df.drop_in_place(name)?;
            dropped.push(name.clone());
        }
    }
    if !dropped.is_empty() {
        info!("Dropped configured columns: {}", dropped.join(", "));
    }
    Ok(dropped)
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> anyhow::Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Series::new("STATUS".into(), &[Some("STOLEN"), Some("UNKNOWN"), None, Some("RECOVERED")])
                .into(),
            Series::new("BIKE_MODEL".into(), &[Some("X1"), None, None, Some("Z")]).into(),
            Series::new("BIKE_SPEED".into(), &[Some("10"), Some("12"), Some(""), Some("3")]).into(),
        ])?)
    }

    #[test]
    fn test_filter_labels_removes_excluded_and_null() -> anyhow::Result<()> {
        let df = frame()?;
        let (filtered, removed) = filter_labels(&df, "STATUS", &["UNKNOWN".to_owned()])?;
        assert_eq!(removed, 2);
        assert_eq!(filtered.height(), 2);
        let labels = text_values(&filtered, "STATUS")?;
        assert_eq!(
            labels,
            vec![Some("STOLEN".to_owned()), Some("RECOVERED".to_owned())]
        );
        Ok(())
    }

    #[test]
    fn test_filter_labels_missing_column() -> anyhow::Result<()> {
        let df = frame()?;
        let err = filter_labels(&df, "OUTCOME", &[]).unwrap_err();
        assert!(matches!(err, TheftcastError::MissingLabelColumn(ref c) if c == "OUTCOME"));
        Ok(())
    }

    #[test]
    fn test_drop_columns_ignores_absent() -> anyhow::Result<()> {
        let mut df = frame()?;
        let dropped = drop_columns(&mut df, &["BIKE_MODEL".to_owned(), "NOPE".to_owned()])?;
        assert_eq!(dropped, vec!["BIKE_MODEL".to_owned()]);
        assert_eq!(column_names(&df), vec!["STATUS", "BIKE_SPEED"]);
        Ok(())
    }

    #[test]
    fn test_empty_text_is_missing() -> anyhow::Result<()> {
        let df = frame()?;
        let speeds = float_values(&df, "BIKE_SPEED")?;
        assert_eq!(speeds, vec![Some(10.0), Some(12.0), None, Some(3.0)]);
        Ok(())
    }

    #[test]
    fn test_csv_roundtrip_reads_text() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("thefts.csv");
        let mut df = frame()?;
        save_csv(&mut df, &path)?;
        let loaded = load_csv(&path)?;
        assert_eq!(loaded.height(), 4);
        assert!(
            loaded
                .get_columns()
                .iter()
                .all(|c| c.dtype() == &DataType::String)
        );
        Ok(())
    }
}
