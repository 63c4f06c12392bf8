// Run records and the 8-field experiment index

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One field of the experiment index, in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Magnification,
    Target,
    TrainDataset,
    TestDataset,
    Model,
    FeatureExtractor,
    Augmentations,
    Seed,
}

impl Dimension {
    /// All index fields in index order.
    pub const ALL: [Dimension; 8] = [
        Dimension::Magnification,
        Dimension::Target,
        Dimension::TrainDataset,
        Dimension::TestDataset,
        Dimension::Model,
        Dimension::FeatureExtractor,
        Dimension::Augmentations,
        Dimension::Seed,
    ];

    /// Column name of the field.
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Magnification => "magnification",
            Dimension::Target => "target",
            Dimension::TrainDataset => "train_dataset",
            Dimension::TestDataset => "test_dataset",
            Dimension::Model => "model",
            Dimension::FeatureExtractor => "feature_extractor",
            Dimension::Augmentations => "augmentations",
            Dimension::Seed => "seed",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| d.name() == s)
            .ok_or_else(|| format!("unknown index field '{}'", s))
    }
}

/// Value of one index field. Seeds compare numerically, everything else as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimValue {
    Int(i64),
    Text(String),
}

impl DimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DimValue::Text(s) => Some(s),
            DimValue::Int(_) => None,
        }
    }
}

impl fmt::Display for DimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimValue::Int(v) => write!(f, "{}", v),
            DimValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DimValue {
    fn from(s: &str) -> Self {
        DimValue::Text(s.to_string())
    }
}

impl From<String> for DimValue {
    fn from(s: String) -> Self {
        DimValue::Text(s)
    }
}

impl From<i64> for DimValue {
    fn from(v: i64) -> Self {
        DimValue::Int(v)
    }
}

/// The experiment index. Field order is the sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub magnification: String,
    pub target: String,
    pub train_dataset: String,
    pub test_dataset: String,
    pub model: String,
    pub feature_extractor: String,
    pub augmentations: String,
    pub seed: i64,
}

impl RunKey {
    /// Value of a single index field.
    pub fn value(&self, dim: Dimension) -> DimValue {
        let text = match dim {
            Dimension::Magnification => &self.magnification,
            Dimension::Target => &self.target,
            Dimension::TrainDataset => &self.train_dataset,
            Dimension::TestDataset => &self.test_dataset,
            Dimension::Model => &self.model,
            Dimension::FeatureExtractor => &self.feature_extractor,
            Dimension::Augmentations => &self.augmentations,
            Dimension::Seed => return DimValue::Int(self.seed),
        };
        DimValue::Text(text.clone())
    }

    /// Values of several index fields, in the order given.
    pub fn project(&self, dims: &[Dimension]) -> Vec<DimValue> {
        dims.iter().map(|&d| self.value(d)).collect()
    }

    /// True when the field holds `value`.
    pub fn matches(&self, dim: Dimension, value: &DimValue) -> bool {
        match (dim, value) {
            (Dimension::Seed, DimValue::Int(seed)) => self.seed == *seed,
            (Dimension::Seed, DimValue::Text(text)) => {
                text.parse::<i64>().is_ok_and(|seed| seed == self.seed)
            }
            (_, DimValue::Text(_)) => &self.value(dim) == value,
            (_, DimValue::Int(_)) => false,
        }
    }
}

/// Scalar metrics of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Tracking-service run id
    pub run_id: String,
    pub train_auroc: Option<f64>,
    pub val_auroc: Option<f64>,
    pub test_auroc: Option<f64>,
    /// Wall-clock runtime in seconds
    pub runtime: Option<f64>,
}

/// A summarised run: index plus metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub key: RunKey,
    pub metrics: RunMetrics,
}

/// Metric columns of the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TrainAuroc,
    ValAuroc,
    TestAuroc,
    Runtime,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::TrainAuroc => "train_auroc",
            Metric::ValAuroc => "val_auroc",
            Metric::TestAuroc => "test_auroc",
            Metric::Runtime => "runtime",
        }
    }

    /// Read this metric from a run.
    pub fn read(&self, metrics: &RunMetrics) -> Option<f64> {
        match self {
            Metric::TrainAuroc => metrics.train_auroc,
            Metric::ValAuroc => metrics.val_auroc,
            Metric::TestAuroc => metrics.test_auroc,
            Metric::Runtime => metrics.runtime,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_round_trips_through_name() {
        for dim in Dimension::ALL {
            assert_eq!(dim.name().parse::<Dimension>().unwrap(), dim);
        }
        assert!("resolution".parse::<Dimension>().is_err());
    }

    #[test]
    fn test_seed_values_sort_numerically() {
        let mut values = vec![DimValue::Int(10), DimValue::Int(2), DimValue::Int(-1)];
        values.sort();
        assert_eq!(
            values,
            vec![DimValue::Int(-1), DimValue::Int(2), DimValue::Int(10)]
        );
    }

    #[test]
    fn test_seed_matches_text_filter() {
        let key = RunKey {
            magnification: "low".into(),
            target: "isup".into(),
            train_dataset: "tcga".into(),
            test_dataset: "cptac".into(),
            model: "AttentionMIL".into(),
            feature_extractor: "ctranspath".into(),
            augmentations: "none".into(),
            seed: 3,
        };
        assert!(key.matches(Dimension::Seed, &DimValue::Text("3".into())));
        assert!(key.matches(Dimension::Seed, &DimValue::Int(3)));
        assert!(!key.matches(Dimension::Model, &DimValue::Int(3)));
        assert!(key.matches(Dimension::Model, &"AttentionMIL".into()));
    }
}
