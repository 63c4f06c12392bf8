//! Run loader: tracking source -> [`ResultTable`]
//!
//! Fetches a project's runs oldest first, keeps the finished ones and
//! summarises each. The first run that fails to summarise aborts the load.
//!
//! Cached tables are namespaced per source: comparison tables are keyed by
//! their grouping alone, so two sources must never share a cache directory.

use crate::cache::DiskCache;
use crate::results::ResultTable;
use crate::summary::summarize_run;
use crate::tracking::RunSource;
use anyhow::{Context, Result};
use std::path::Path;

/// Project queried when none is configured
pub const DEFAULT_PROJECT: &str = "histaug";

/// Cache key of the default project's result table
pub const RESULTS_CACHE_KEY: &str = "results";

/// Cache key of `project`'s result table.
///
/// ```
/// use histaug::loader::results_cache_key;
///
/// assert_eq!(results_cache_key("histaug"), "results");
/// assert_eq!(results_cache_key("pilot"), "results__pilot");
/// ```
pub fn results_cache_key(project: &str) -> String {
    if project == DEFAULT_PROJECT {
        RESULTS_CACHE_KEY.to_string()
    } else {
        format!("{}__{}", RESULTS_CACHE_KEY, project)
    }
}

/// Cache namespace of a run source, `None` for the default project on the
/// tracking service.
///
/// A runs file is identified by its path; a service project by its entity
/// and name.
pub fn source_scope(
    runs_file: Option<&Path>,
    entity: Option<&str>,
    project: &str,
) -> Option<String> {
    if let Some(path) = runs_file {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        return Some(format!("runs-file__{}", path.display()));
    }
    match entity {
        Some(entity) => Some(format!("project__{}__{}", entity, project)),
        None if project != DEFAULT_PROJECT => Some(format!("project__{}", project)),
        None => None,
    }
}

/// Load and summarise every finished run of `project`.
pub fn load_results(source: &dyn RunSource, project: &str) -> Result<ResultTable> {
    tracing::info!("Loading runs from project '{}'", project);

    let runs = source
        .runs(project)
        .with_context(|| format!("Failed to fetch runs of project '{}'", project))?;
    let total = runs.len();

    let records = runs
        .iter()
        .filter(|run| run.is_finished())
        .map(summarize_run)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to summarize runs")?;

    tracing::info!(
        "Summarized {} finished run(s) out of {} fetched",
        records.len(),
        total
    );
    Ok(ResultTable::from_records(records))
}

/// [`load_results`], persisted under [`results_cache_key`].
///
/// A cached table is returned without contacting `source`. The key does not
/// identify the source itself; see [`source_scope`].
pub fn load_results_cached(
    cache: &DiskCache,
    source: &dyn RunSource,
    project: &str,
) -> Result<ResultTable> {
    cache
        .memoize(
            |project: &str| results_cache_key(project),
            |project: &str| load_results(source, project),
        )
        .call(project)
}
