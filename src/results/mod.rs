// Summarised experiment runs
//
// A run is identified by the 8-field index (magnification, target,
// train_dataset, test_dataset, model, feature_extractor, augmentations, seed).
// After loading, every index value appears at most once and the table is
// sorted by it.

mod record;
mod table;

pub use record::{DimValue, Dimension, Metric, RunKey, RunMetrics, RunRecord};
pub use table::{MetricSeries, ResultTable};
