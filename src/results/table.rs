// Result table: de-duplicated, index-sorted run records

use super::record::{Dimension, DimValue, Metric, RunKey, RunRecord};
use serde::{Deserialize, Serialize};

/// All summarised runs, sorted by [`RunKey`], one record per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    records: Vec<RunRecord>,
}

/// One metric column of the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: Metric,
    pub points: Vec<(RunKey, Option<f64>)>,
}

impl ResultTable {
    /// Build a table from records in source (creation) order.
    ///
    /// Records sharing a key collapse to the first one seen.
    pub fn from_records(mut records: Vec<RunRecord>) -> Self {
        let before = records.len();
        // Stable sort keeps creation order among equal keys
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records.dedup_by(|later, first| later.key == first.key);

        let dropped = before - records.len();
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} run(s) whose index duplicated an earlier run",
                dropped
            );
        }

        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter()
    }

    /// Look up a run by its full index.
    pub fn get(&self, key: &RunKey) -> Option<&RunRecord> {
        self.records
            .binary_search_by(|r| r.key.cmp(key))
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// Rows whose index fields equal every given value.
    pub fn query(&self, filters: &[(Dimension, DimValue)]) -> ResultTable {
        let records = self
            .records
            .iter()
            .filter(|r| filters.iter().all(|(dim, value)| r.key.matches(*dim, value)))
            .cloned()
            .collect();
        ResultTable { records }
    }

    /// Distinct values of one index field, sorted.
    pub fn distinct(&self, dim: Dimension) -> Vec<DimValue> {
        let mut values: Vec<DimValue> = self.records.iter().map(|r| r.key.value(dim)).collect();
        values.sort();
        values.dedup();
        values
    }

    /// Extract one metric column.
    pub fn series(&self, metric: Metric) -> MetricSeries {
        MetricSeries {
            metric,
            points: self
                .records
                .iter()
                .map(|r| (r.key.clone(), metric.read(&r.metrics)))
                .collect(),
        }
    }
}

impl MetricSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keep only points matching every filter.
    pub fn query(&self, filters: &[(Dimension, DimValue)]) -> MetricSeries {
        MetricSeries {
            metric: self.metric,
            points: self
                .points
                .iter()
                .filter(|(key, _)| filters.iter().all(|(dim, value)| key.matches(*dim, value)))
                .cloned()
                .collect(),
        }
    }
}
