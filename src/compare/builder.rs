//! Parallel results-table builder
//!
//! Partitions a metric series by the observed combinations of the fixed
//! dimensions, runs the comparator for every group on a dedicated worker
//! pool, and reassembles a [`PivotTable`]. Work items own their rows, so
//! workers share nothing; output order does not depend on completion order.

use super::comparator::{compare_to_best, Comparison, CompareError, GroupRow};
use super::pivot::PivotTable;
use crate::cache::{CacheError, DiskCache};
use crate::results::{DimValue, Dimension, MetricSeries, RunKey};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

/// Worker pool size when none is configured
pub const DEFAULT_WORKERS: usize = 32;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("cannot vary '{0}' while also holding it fixed")]
    VaryIsFixed(Dimension),

    #[error("'{0}' is listed more than once in the fixed dimensions")]
    RepeatedFixed(Dimension),

    #[error("seeds are the sampling axis and cannot be the varying dimension")]
    VarySeed,

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("comparison failed for group ({combination}): {source}")]
    Group {
        combination: String,
        #[source]
        source: CompareError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Cache key of a results table: depends only on the grouping.
///
/// The metric and the rows are not part of the key.
pub fn results_table_key(fixed: &[Dimension], vary: Dimension) -> String {
    let fixed: Vec<&str> = fixed.iter().map(Dimension::name).collect();
    format!("norm_diff__{}__{}", vary, fixed.join("_"))
}

/// One independent unit of work: a fixed-dimension combination and its rows
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub combination: Vec<DimValue>,
    pub rows: Vec<(RunKey, Option<f64>)>,
}

/// Group a series by the observed values of `fixed`, sorted by combination.
pub fn partition(series: &MetricSeries, fixed: &[Dimension]) -> Vec<WorkItem> {
    let mut groups: BTreeMap<Vec<DimValue>, Vec<(RunKey, Option<f64>)>> = BTreeMap::new();
    for (key, metric) in &series.points {
        groups
            .entry(key.project(fixed))
            .or_default()
            .push((key.clone(), *metric));
    }
    groups
        .into_iter()
        .map(|(combination, rows)| WorkItem { combination, rows })
        .collect()
}

fn describe(fixed: &[Dimension], combination: &[DimValue]) -> String {
    fixed
        .iter()
        .zip(combination)
        .map(|(dim, value)| format!("{}={}", dim, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Comparator call for one work item.
pub fn compare_worker(
    item: WorkItem,
    vary: Dimension,
    show_progress: bool,
) -> Result<(Vec<DimValue>, Comparison), CompareError> {
    let rows: Vec<GroupRow> = item
        .rows
        .into_iter()
        .map(|(key, metric)| GroupRow {
            seed: key.seed,
            value: key.value(vary),
            metric,
        })
        .collect();
    let comparison = compare_to_best(&rows, show_progress)?;
    Ok((item.combination, comparison))
}

/// Builds pivoted comparison tables on a fixed-size worker pool
#[derive(Debug, Clone)]
pub struct TableBuilder {
    n_workers: usize,
    show_progress: bool,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self {
            n_workers: DEFAULT_WORKERS,
            show_progress: false,
        }
    }
}

impl TableBuilder {
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers,
            ..Self::default()
        }
    }

    /// Show a progress bar over groups (and over combinations with one worker).
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    fn validate(&self, fixed: &[Dimension], vary: Dimension) -> Result<(), BuildError> {
        if self.n_workers == 0 {
            return Err(BuildError::NoWorkers);
        }
        if vary == Dimension::Seed {
            return Err(BuildError::VarySeed);
        }
        if fixed.contains(&vary) {
            return Err(BuildError::VaryIsFixed(vary));
        }
        for (i, dim) in fixed.iter().enumerate() {
            if fixed[..i].contains(dim) {
                return Err(BuildError::RepeatedFixed(*dim));
            }
        }
        Ok(())
    }

    /// Compute the pivot table of expected deficits for `vary` within each
    /// observed combination of `fixed`.
    pub fn build(
        &self,
        series: &MetricSeries,
        fixed: &[Dimension],
        vary: Dimension,
    ) -> Result<PivotTable, BuildError> {
        self.validate(fixed, vary)?;

        let items = partition(series, fixed);
        tracing::info!(
            "Comparing {} across {} groups of {} on {} workers",
            vary,
            items.len(),
            describe_dims(fixed),
            self.n_workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_workers)
            .thread_name(|i| format!("histaug-compare-{}", i))
            .build()?;

        let progress = self.show_progress.then(|| {
            let pb = ProgressBar::new(items.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} groups | {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            pb.set_message("Computing results");
            pb
        });
        let per_group_progress = self.show_progress && self.n_workers == 1;

        let results = pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    let combination = item.combination.clone();
                    let outcome = compare_worker(item, vary, per_group_progress).map_err(|source| {
                        BuildError::Group {
                            combination: describe(fixed, &combination),
                            source,
                        }
                    });
                    if let Ok((_, comparison)) = &outcome {
                        tracing::debug!(
                            "Computed results for ({}) over {} combinations",
                            describe(fixed, &combination),
                            comparison.combinations
                        );
                    }
                    if let Some(pb) = &progress {
                        pb.inc(1);
                    }
                    outcome
                })
                .collect::<Result<Vec<_>, BuildError>>()
        });

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let groups = results?
            .into_iter()
            .map(|(combination, comparison)| (combination, comparison.stats));
        Ok(PivotTable::from_groups(fixed.to_vec(), vary, groups))
    }

    /// [`build`](Self::build), memoised under [`results_table_key`].
    pub fn build_cached(
        &self,
        cache: &DiskCache,
        series: &MetricSeries,
        fixed: &[Dimension],
        vary: Dimension,
    ) -> Result<PivotTable, BuildError> {
        cache
            .memoize(
                |grouping: &(Vec<Dimension>, Dimension)| results_table_key(&grouping.0, grouping.1),
                |grouping: &(Vec<Dimension>, Dimension)| self.build(series, &grouping.0, grouping.1),
            )
            .call(&(fixed.to_vec(), vary))
    }
}

fn describe_dims(dims: &[Dimension]) -> String {
    let names: Vec<&str> = dims.iter().map(Dimension::name).collect();
    format!("({})", names.join(", "))
}
