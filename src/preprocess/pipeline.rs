use super::correlation::{PruneOutcome, prune_correlated};
use super::encoding::{
    CleanupRecord, EncodingMap, apply_cleanup, encode_categoricals, save_encoding_maps,
    stage_encoding_maps,
};
use super::imputation::{ImputationRecord, impute};
use super::io::{column_names, drop_columns, filter_labels};
use super::profiling::{profile, reprofile};
use super::types::TableProfile;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::persist::StagedWrites;
use crate::report::{Stage, StageClock, StageTiming};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// The model-ready table plus every decision taken while producing it.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Fully numeric: `Float64` features, `Int64` category codes.
    pub table: DataFrame,
    pub label_column: String,
    pub removed_label_rows: usize,
    pub dropped_columns: Vec<String>,
    /// Statistics taken before imputation; used for pruning tie-breaks.
    pub initial_profile: TableProfile,
    /// Statistics of the pruned table, kinds as first assigned.
    pub final_profile: TableProfile,
    pub imputations: Vec<ImputationRecord>,
    pub cleanups: Vec<CleanupRecord>,
    pub encodings: Vec<EncodingMap>,
    pub pruning: PruneOutcome,
    pub timings: Vec<StageTiming>,
}

impl Preprocessed {
    /// Every column except the label, in table order.
    pub fn feature_names(&self) -> Vec<String> {
        column_names(&self.table)
            .into_iter()
            .filter(|c| c != &self.label_column)
            .collect()
    }

    /// The encoding of the label column, when it was categorical.
    pub fn label_map(&self) -> Option<&EncodingMap> {
        self.encodings
            .iter()
            .find(|m| m.column() == self.label_column)
    }

    pub fn save_mappings(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        save_encoding_maps(&self.encodings, dir)
    }

    /// Stages the mapping files as part of a larger all-or-nothing write.
    pub fn stage_mappings(&self, dir: &Path, files: &mut StagedWrites) -> Result<Vec<PathBuf>> {
        stage_encoding_maps(&self.encodings, dir, files)
    }
}

/// Runs profiling, imputation, encoding and pruning over a raw table.
#[instrument(skip_all, fields(rows = raw.height(), cols = raw.width()))]
pub fn preprocess(raw: DataFrame, config: &PipelineConfig) -> Result<Preprocessed> {
    let mut clock = StageClock::new();

    let (mut df, removed_label_rows) =
        filter_labels(&raw, &config.label_column, &config.excluded_labels)?;
    drop(raw);
    let dropped_columns = drop_columns(&mut df, &config.dropped_columns)?;
    clock.mark(Stage::Loaded);

    let initial_profile = profile(&mut df)?;
    clock.mark(Stage::Profiled);

    let imputations = impute(&mut df, &initial_profile)?;
    clock.mark(Stage::Imputed);

    let cleanups = apply_cleanup(&mut df, &initial_profile, &config.cleanup_rules)?;
    let encodings = encode_categoricals(&mut df, &initial_profile)?;
    clock.mark(Stage::Encoded);

    let pruning = prune_correlated(
        &mut df,
        &initial_profile,
        config.correlation_threshold,
        &[config.label_column.as_str()],
    )?;
    let final_profile = reprofile(&df, &initial_profile)?;
    clock.mark(Stage::Pruned);

    info!(
        "Preprocessing complete: {} rows x {} columns",
        df.height(),
        df.width()
    );

    Ok(Preprocessed {
        table: df,
        label_column: config.label_column.clone(),
        removed_label_rows,
        dropped_columns,
        initial_profile,
        final_profile,
        imputations,
        cleanups,
        encodings,
        pruning,
        timings: clock.into_timings(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TheftcastError;
    use crate::preprocess::types::ColumnKind;

    fn raw() -> anyhow::Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Series::new(
                "STATUS".into(),
                &["STOLEN", "RECOVERED", "UNKNOWN", "STOLEN", "STOLEN", "RECOVERED"],
            )
            .into(),
            Series::new("BIKE_MODEL".into(), &[Some("A"), None, None, None, None, None]).into(),
            Series::new("BIKE_MAKE".into(), &["TREK", "?", "GIANT", "TREK", "GIANT", "TREK"]).into(),
            Series::new(
                "BIKE_COST".into(),
                &[Some("100"), Some("250"), Some("80"), None, Some("400"), Some("120")],
            )
            .into(),
        ])?)
    }

    #[test]
    fn test_preprocess_produces_numeric_table() -> anyhow::Result<()> {
        let out = preprocess(raw()?, &PipelineConfig::default())?;

        assert_eq!(out.removed_label_rows, 1);
        assert_eq!(out.dropped_columns, vec!["BIKE_MODEL".to_owned()]);
        assert_eq!(out.table.height(), 5);
        assert!(
            out.table
                .get_columns()
                .iter()
                .all(|c| c.dtype().is_primitive_numeric() && c.null_count() == 0)
        );
        assert_eq!(out.feature_names(), vec!["BIKE_MAKE", "BIKE_COST"]);
        assert_eq!(out.imputations.len(), 1);
        assert_eq!(out.cleanups.iter().map(|c| c.replaced).sum::<usize>(), 1);

        let label = out.label_map().expect("label is categorical");
        assert_eq!(label.categories(), ["RECOVERED", "STOLEN"]);
        assert_eq!(
            out.final_profile.kind_of("BIKE_MAKE"),
            Some(ColumnKind::Categorical)
        );
        Ok(())
    }

    #[test]
    fn test_missing_label_column() -> anyhow::Result<()> {
        let config = PipelineConfig {
            label_column: "OUTCOME".to_owned(),
            ..PipelineConfig::default()
        };
        let err = preprocess(raw()?, &config).unwrap_err();
        assert!(matches!(err, TheftcastError::MissingLabelColumn(_)));
        Ok(())
    }

    #[test]
    fn test_all_rows_excluded_is_empty_input() -> anyhow::Result<()> {
        let config = PipelineConfig {
            excluded_labels: vec!["STOLEN".into(), "RECOVERED".into(), "UNKNOWN".into()],
            ..PipelineConfig::default()
        };
        let err = preprocess(raw()?, &config).unwrap_err();
        assert!(matches!(err, TheftcastError::EmptyInput(_)));
        Ok(())
    }

    #[test]
    fn test_mappings_written_for_every_categorical() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = preprocess(raw()?, &PipelineConfig::default())?;
        let paths = out.save_mappings(dir.path())?;
        let names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(str::to_owned))
            .collect();
        assert_eq!(names, vec!["mapping_STATUS.csv", "mapping_BIKE_MAKE.csv"]);
        Ok(())
    }
}
