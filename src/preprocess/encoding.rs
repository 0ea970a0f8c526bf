use super::imputation::mode;
use super::io::{float_values, has_column, load_csv, text_values};
use super::types::{ColumnKind, TableProfile};
use crate::error::{Result, TheftcastError};
use crate::persist::StagedWrites;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ORIGINAL_HEADER: &str = "Original Category";
const ENCODED_HEADER: &str = "Encoded Value";

/// A named value cleanup applied to one categorical column before encoding.
///
/// Offending values are replaced by the column mode, computed over the
/// column as it stands after imputation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "rule")]
pub enum CleanupRule {
    /// Values whose trimmed text is all ASCII digits.
    DigitsOnly { column: String },
    /// Values whose trimmed text is one of `values`.
    Sentinels { column: String, values: Vec<String> },
}

impl CleanupRule {
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::DigitsOnly {
                column: "BIKE_COLOUR".to_owned(),
            },
            Self::Sentinels {
                column: "BIKE_MAKE".to_owned(),
                values: ["(UNK)", "-", "0", "?"].map(str::to_owned).to_vec(),
            },
        ]
    }

    pub fn column(&self) -> &str {
        match self {
            Self::DigitsOnly { column } | Self::Sentinels { column, .. } => column,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        let trimmed = value.trim();
        match self {
            Self::DigitsOnly { .. } => {
                !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
            }
            Self::Sentinels { values, .. } => values.iter().any(|v| v == trimmed),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CleanupRecord {
    pub column: String,
    pub replacement: String,
    pub replaced: usize,
}

/// Applies each rule whose column is present and categorical.
pub fn apply_cleanup(
    df: &mut DataFrame,
    profile: &TableProfile,
    rules: &[CleanupRule],
) -> Result<Vec<CleanupRecord>> {
    let mut records = Vec::new();
    for rule in rules {
        let name = rule.column();
        if !has_column(df, name) {
            debug!("Cleanup column '{name}' not present, skipping");
            continue;
        }
        if profile.kind_of(name) != Some(ColumnKind::Categorical) {
            debug!("Cleanup column '{name}' is not categorical, skipping");
            continue;
        }

        let values = text_values(df, name)?;
        let Some(replacement) = mode(&values) else {
            continue;
        };
        let mut replaced = 0;
        let cleaned: Vec<Option<String>> = values
            .into_iter()
            .map(|v| match v {
                Some(s) if rule.matches(&s) => {
                    replaced += 1;
                    Some(replacement.clone())
                }
                other => other,
            })
            .collect();
        df.with_column(Series::new(name.into(), cleaned))?;

        if replaced > 0 {
            info!("Replaced {replaced} junk value(s) in '{name}' with '{replacement}'");
        }
        records.push(CleanupRecord {
            column: name.to_owned(),
            replacement,
            replaced,
        });
    }
    Ok(records)
}

/// Value → dense integer code for one categorical column.
///
/// Codes follow the sorted order of the distinct values, so code `i` is the
/// `i`-th smallest category.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EncodingMap {
    column: String,
    categories: Vec<String>,
}

impl EncodingMap {
    pub fn fit<'a>(column: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut categories: Vec<String> = values.into_iter().map(str::to_owned).collect();
        categories.sort();
        categories.dedup();
        Self {
            column: column.to_owned(),
            categories,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn encode(&self, value: &str) -> Option<i64> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|i| i as i64)
    }

    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.categories.get(i))
            .map(String::as_str)
    }

    pub fn file_name(column: &str) -> String {
        format!("mapping_{column}.csv")
    }

    /// The mapping file contents: one `original,code` row per category.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let codes: Vec<i64> = (0..self.categories.len() as i64).collect();
        let mut df = DataFrame::new(vec![
            Series::new(ORIGINAL_HEADER.into(), self.categories.clone()).into(),
            Series::new(ENCODED_HEADER.into(), codes).into(),
        ])?;
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf).include_header(true).finish(&mut df)?;
        Ok(buf)
    }

    /// Writes `mapping_<column>.csv` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let mut files = StagedWrites::new();
        let path = self.stage(dir, &mut files)?;
        files.commit()?;
        Ok(path)
    }

    /// Stages `mapping_<column>.csv` in `dir` without making it visible.
    pub fn stage(&self, dir: &Path, files: &mut StagedWrites) -> Result<PathBuf> {
        let path = dir.join(Self::file_name(&self.column));
        files.stage(&path, &self.to_csv_bytes()?)?;
        Ok(path)
    }

    /// Reads a mapping file written by [`EncodingMap::save`].
    ///
    /// The column name is taken from the `mapping_<column>.csv` file name.
    pub fn load(path: &Path) -> Result<Self> {
        let column = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("mapping_"))
            .ok_or_else(|| {
                TheftcastError::DataProcessing(format!(
                    "Not a mapping file name: {}",
                    path.display()
                ))
            })?
            .to_owned();

        let df = load_csv(path)?;
        let originals = text_values(&df, ORIGINAL_HEADER)?;
        let codes = float_values(&df, ENCODED_HEADER)?;

        let mut pairs = Vec::with_capacity(originals.len());
        for (original, code) in originals.into_iter().zip(codes) {
            match (original, code) {
                (Some(o), Some(c)) => pairs.push((c as i64, o)),
                _ => {
                    return Err(TheftcastError::DataProcessing(format!(
                        "Incomplete row in mapping file {}",
                        path.display()
                    )));
                }
            }
        }
        pairs.sort_by_key(|(code, _)| *code);
        if pairs.iter().enumerate().any(|(i, (code, _))| *code != i as i64) {
            return Err(TheftcastError::DataProcessing(format!(
                "Codes in {} are not dense from 0",
                path.display()
            )));
        }

        let map = Self::fit(&column, pairs.iter().map(|(_, o)| o.as_str()));
        if map.len() != pairs.len() {
            return Err(TheftcastError::DataProcessing(format!(
                "Duplicate categories in {}",
                path.display()
            )));
        }
        Ok(map)
    }
}

/// Replaces every categorical column in `df` with its integer codes.
pub fn encode_categoricals(df: &mut DataFrame, profile: &TableProfile) -> Result<Vec<EncodingMap>> {
    let mut maps = Vec::new();
    for name in profile.names_of_kind(ColumnKind::Categorical) {
        if !has_column(df, &name) {
            continue;
        }
        let values = text_values(df, &name)?;
        let map = EncodingMap::fit(&name, values.iter().flatten().map(String::as_str));

        let mut codes = Vec::with_capacity(values.len());
        for value in &values {
            let code = value.as_deref().and_then(|v| map.encode(v)).ok_or_else(|| {
                TheftcastError::DataProcessing(format!(
                    "Column '{name}' still has missing values at encoding time"
                ))
            })?;
            codes.push(code);
        }
        df.with_column(Series::new(name.as_str().into(), codes))?;
        debug!("Encoded '{}' into {} codes", name, map.len());
        maps.push(map);
    }
    info!("Encoded {} categorical column(s)", maps.len());
    Ok(maps)
}

/// Stages one mapping file per map into `dir`.
pub fn stage_encoding_maps(
    maps: &[EncodingMap],
    dir: &Path,
    files: &mut StagedWrites,
) -> Result<Vec<PathBuf>> {
    maps.iter().map(|m| m.stage(dir, files)).collect()
}

/// Writes one mapping file per map into `dir`, creating it if needed.
///
/// Either every file is written or none is.
pub fn save_encoding_maps(maps: &[EncodingMap], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = StagedWrites::new();
    let paths = stage_encoding_maps(maps, dir, &mut files)?;
    files.commit()?;
    Ok(paths)
}
