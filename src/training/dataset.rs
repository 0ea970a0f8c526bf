use crate::error::{Result, TheftcastError};
use crate::preprocess::Preprocessed;
use crate::preprocess::io::float_values;
use ndarray::{Array1, Array2, Axis};

/// Feature matrix, binary labels and the names that go with them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    pub x: Array2<f64>,
    /// Class indices, always 0 or 1.
    pub y: Array1<usize>,
    pub feature_names: Vec<String>,
    /// Original label values; `classes[1]` is the positive class.
    pub classes: Vec<String>,
}

impl TrainingData {
    pub fn new(
        x: Array2<f64>,
        y: Array1<usize>,
        feature_names: Vec<String>,
        classes: Vec<String>,
    ) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(TheftcastError::Training(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() != feature_names.len() {
            return Err(TheftcastError::Training(format!(
                "{} feature columns but {} names",
                x.ncols(),
                feature_names.len()
            )));
        }
        if y.iter().any(|&c| c > 1) {
            return Err(TheftcastError::InvalidLabel(
                "class indices must be 0 or 1".to_owned(),
            ));
        }
        Ok(Self {
            x,
            y,
            feature_names,
            classes,
        })
    }

    /// Builds the matrix from a preprocessed table.
    ///
    /// A categorical label uses its encoding (codes 0 and 1); a numeric label
    /// is mapped through its two sorted distinct values. Anything other than
    /// exactly two classes is rejected.
    pub fn from_preprocessed(pre: &Preprocessed) -> Result<Self> {
        let feature_names = pre.feature_names();
        if feature_names.is_empty() {
            return Err(TheftcastError::EmptyInput(
                "no feature columns left after preprocessing".to_owned(),
            ));
        }

        let label_values = float_values(&pre.table, &pre.label_column)?;
        let (y, classes) = match pre.label_map() {
            Some(map) => {
                if map.len() != 2 {
                    return Err(TheftcastError::InvalidLabel(format!(
                        "'{}' has {} classes ({}), expected 2",
                        pre.label_column,
                        map.len(),
                        map.categories().join(", ")
                    )));
                }
                let y = label_values
                    .iter()
                    .map(|v| v.map(|c| c as usize))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| missing_label(&pre.label_column))?;
                (y, map.categories().to_vec())
            }
            None => binarize_numeric(&pre.label_column, &label_values)?,
        };

        let n_rows = pre.table.height();
        let mut x = Array2::<f64>::zeros((n_rows, feature_names.len()));
        for (j, name) in feature_names.iter().enumerate() {
            let values = float_values(&pre.table, name)?;
            for (i, v) in values.into_iter().enumerate() {
                x[[i, j]] = v.ok_or_else(|| {
                    TheftcastError::DataProcessing(format!(
                        "Column '{name}' has a missing value at row {i}"
                    ))
                })?;
            }
        }

        Self::new(x, Array1::from_vec(y), feature_names, classes)
    }

    pub fn n_samples(&self) -> usize {
        self.y.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.y.iter().filter(|&&c| c == 1).count();
        [self.y.len() - positives, positives]
    }

    /// Keeps only the named features, in the order given.
    pub fn select_features(&self, names: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .feature_names
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| TheftcastError::MissingFeatures(vec![name.clone()]))?;
            indices.push(idx);
        }
        Ok(Self {
            x: self.x.select(Axis(1), &indices),
            y: self.y.clone(),
            feature_names: names.to_vec(),
            classes: self.classes.clone(),
        })
    }

    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            classes: self.classes.clone(),
        }
    }
}

fn missing_label(column: &str) -> TheftcastError {
    TheftcastError::InvalidLabel(format!("'{column}' has missing values"))
}

fn binarize_numeric(column: &str, values: &[Option<f64>]) -> Result<(Vec<usize>, Vec<String>)> {
    let present = values
        .iter()
        .copied()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| missing_label(column))?;
    let mut distinct = present.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    let [low, high] = distinct[..] else {
        return Err(TheftcastError::InvalidLabel(format!(
            "'{column}' has {} distinct values, expected 2",
            distinct.len()
        )));
    };
    let y = present.iter().map(|&v| usize::from(v == high)).collect();
    Ok((y, vec![low.to_string(), high.to_string()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::preprocess::preprocess;
    use polars::prelude::*;

    #[test]
    fn test_from_preprocessed_categorical_label() -> anyhow::Result<()> {
        let raw = DataFrame::new(vec![
            Series::new("STATUS".into(), &["STOLEN", "RECOVERED", "STOLEN", "STOLEN"]).into(),
            Series::new("BIKE_COST".into(), &["100", "200", "300", "250"]).into(),
        ])?;
        let pre = preprocess(raw, &PipelineConfig::default())?;
        let data = TrainingData::from_preprocessed(&pre)?;

        assert_eq!(data.classes, vec!["RECOVERED", "STOLEN"]);
        assert_eq!(data.y.to_vec(), vec![1, 0, 1, 1]);
        assert_eq!(data.feature_names, vec!["BIKE_COST"]);
        assert_eq!(data.x[[2, 0]], 300.0);
        assert_eq!(data.class_counts(), [1, 3]);
        Ok(())
    }

    #[test]
    fn test_three_classes_rejected() -> anyhow::Result<()> {
        let raw = DataFrame::new(vec![
            Series::new("STATUS".into(), &["STOLEN", "RECOVERED", "LOST"]).into(),
            Series::new("BIKE_COST".into(), &["100", "200", "300"]).into(),
        ])?;
        let pre = preprocess(raw, &PipelineConfig::default())?;
        let err = TrainingData::from_preprocessed(&pre).unwrap_err();
        assert!(matches!(err, TheftcastError::InvalidLabel(_)));
        Ok(())
    }

    #[test]
    fn test_numeric_label_binarized() {
        let (y, classes) =
            binarize_numeric("STATUS", &[Some(3.0), Some(7.0), Some(3.0)]).unwrap_or_default();
        assert_eq!(y, vec![0, 1, 0]);
        assert_eq!(classes, vec!["3", "7"]);
    }

    #[test]
    fn test_select_features_in_given_order() -> anyhow::Result<()> {
        let data = TrainingData::new(
            ndarray::array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            ndarray::array![0, 1],
            vec!["A".into(), "B".into(), "C".into()],
            vec!["N".into(), "Y".into()],
        )?;
        let sub = data.select_features(&["C".to_owned(), "A".to_owned()])?;
        assert_eq!(sub.x, ndarray::array![[3.0, 1.0], [6.0, 4.0]]);

        let err = data.select_features(&["Z".to_owned()]).unwrap_err();
        assert!(matches!(err, TheftcastError::MissingFeatures(_)));
        Ok(())
    }
}
