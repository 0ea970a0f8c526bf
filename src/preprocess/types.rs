use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug, Hash)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "Numeric",
            Self::Categorical => "Categorical",
        }
    }
}

/// Per-column statistics recorded by the profiler.
///
/// `cardinality` is set for categorical columns and `variance` for numeric
/// ones; these are the tie-break metrics used by the correlation pruner.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ColumnStats {
    pub name: String,
    pub kind: ColumnKind,
    pub count: usize,
    pub missing: usize,
    pub cardinality: Option<usize>,
    pub variance: Option<f64>,
}

impl ColumnStats {
    pub fn missing_pct(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.missing as f64 / self.count as f64) * 100.0
        }
    }

    pub fn has_missing(&self) -> bool {
        self.missing > 0
    }
}

/// Ordered column statistics for a whole table.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct TableProfile {
    pub row_count: usize,
    pub columns: Vec<ColumnStats>,
}

impl TableProfile {
    pub fn get(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.get(name).map(|c| c.kind)
    }

    pub fn names_of_kind(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Absolute Pearson coefficients; `None` where a column is constant.
    pub data: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.data.get(i).and_then(|row| row.get(j)).copied().flatten()
    }
}

/// An unordered column pair whose absolute correlation exceeded the threshold.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CorrelationPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
    /// The column marked for removal, if the tie-break rule resolved the pair.
    pub dropped: Option<String>,
}
