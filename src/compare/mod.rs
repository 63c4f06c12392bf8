// Statistical comparison of a varying dimension within fixed-dimension groups
//
// comparator: exact enumeration of the expected deficit from the best value
// builder:    grouping, worker-pool dispatch and memoisation
// pivot:      the reassembled (fixed tuple) x (value, statistic) table

mod builder;
mod comparator;
mod pivot;

pub use builder::{
    compare_worker, partition, results_table_key, BuildError, TableBuilder, WorkItem,
    DEFAULT_WORKERS,
};
pub use comparator::{
    combination_count, compare_to_best, for_each_deficit, CompareError, Comparison,
    DeficitStats, GroupRow,
};
pub use pivot::{PivotColumn, PivotRow, PivotTable, StatName};

use crate::results::Dimension;

/// Fixed dimensions used when comparing feature extractors
pub const FEATURE_EXTRACTOR_FIXED: [Dimension; 4] = [
    Dimension::Magnification,
    Dimension::Augmentations,
    Dimension::Model,
    Dimension::Target,
];

/// Fixed dimensions used when comparing models
pub const MODEL_FIXED: [Dimension; 4] = [
    Dimension::Magnification,
    Dimension::Augmentations,
    Dimension::FeatureExtractor,
    Dimension::Target,
];

/// Fixed dimensions used when comparing magnifications
pub const MAGNIFICATION_FIXED: [Dimension; 4] = [
    Dimension::Augmentations,
    Dimension::Model,
    Dimension::FeatureExtractor,
    Dimension::Target,
];

/// A named (fixed dimensions, varying dimension) grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    FeatureExtractor,
    Model,
    Magnification,
}

impl Preset {
    /// The comparisons run when none are requested.
    pub const DEFAULTS: [Preset; 2] = [Preset::FeatureExtractor, Preset::Model];

    pub fn fixed(&self) -> &'static [Dimension] {
        match self {
            Preset::FeatureExtractor => &FEATURE_EXTRACTOR_FIXED,
            Preset::Model => &MODEL_FIXED,
            Preset::Magnification => &MAGNIFICATION_FIXED,
        }
    }

    pub fn vary(&self) -> Dimension {
        match self {
            Preset::FeatureExtractor => Dimension::FeatureExtractor,
            Preset::Model => Dimension::Model,
            Preset::Magnification => Dimension::Magnification,
        }
    }

    pub fn cache_key(&self) -> String {
        results_table_key(self.fixed(), self.vary())
    }
}
