//! Blocking client for the tracking service's GraphQL API
//!
//! Runs are requested page by page (cursor pagination, oldest first). Each
//! page carries the run configuration, summary metrics and a sampled history,
//! all of which arrive as JSON-encoded strings and are decoded here.

use super::{HistoryRow, RunSource, RunState, TrackedRun, TrackingError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Public tracking service endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.wandb.ai";

const RUNS_QUERY: &str = r#"
query ProjectRuns($project: String!, $entity: String, $cursor: String, $perPage: Int!, $order: String!, $samples: Int!) {
  project(name: $project, entityName: $entity) {
    runs(first: $perPage, after: $cursor, order: $order) {
      edges {
        node {
          name
          state
          config
          summaryMetrics
          history(samples: $samples)
        }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
    }
  }
}
"#;

/// Tracking service client
#[derive(Debug, Clone)]
pub struct WandbClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    entity: Option<String>,
    per_page: usize,
    history_samples: usize,
}

impl WandbClient {
    /// Create a client with the default page size (1000) and history sampling (10000).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        entity: Option<String>,
    ) -> Result<Self, TrackingError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("histaug/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            entity,
            per_page: 1000,
            history_samples: 10_000,
        })
    }

    pub fn with_page_size(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_history_samples(mut self, samples: usize) -> Self {
        self.history_samples = samples;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/graphql", self.base_url.trim_end_matches('/'))
    }

    fn fetch_page(&self, project: &str, cursor: Option<&str>) -> Result<RunPage, TrackingError> {
        let body = json!({
            "query": RUNS_QUERY,
            "variables": {
                "project": project,
                "entity": self.entity,
                "cursor": cursor,
                "perPage": self.per_page,
                "order": "+created_at",
                "samples": self.history_samples,
            }
        });

        let response: GraphQlResponse = self
            .http
            .post(self.endpoint())
            .basic_auth("api", Some(&self.api_key))
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        decode_page(response, project)
    }
}

impl RunSource for WandbClient {
    fn runs(&self, project: &str) -> Result<Vec<TrackedRun>, TrackingError> {
        collect_pages(project, |cursor| self.fetch_page(project, cursor))
    }
}

/// Follow `next_cursor` until the last page.
///
/// A cursor that comes back twice would loop forever and is an error.
pub(super) fn collect_pages<F>(
    project: &str,
    mut fetch: F,
) -> Result<Vec<TrackedRun>, TrackingError>
where
    F: FnMut(Option<&str>) -> Result<RunPage, TrackingError>,
{
    let mut runs = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = fetch(cursor.as_deref())?;
        tracing::debug!(
            "Fetched {} runs from project {} (total {})",
            page.runs.len(),
            project,
            runs.len() + page.runs.len()
        );
        runs.extend(page.runs);

        match page.next_cursor {
            Some(next) => {
                if !seen.insert(next.clone()) {
                    return Err(TrackingError::RepeatedCursor(next));
                }
                cursor = Some(next);
            }
            None => break,
        }
    }

    Ok(runs)
}

#[derive(Debug, Deserialize)]
pub(super) struct GraphQlResponse {
    data: Option<ProjectData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProjectData {
    project: Option<ProjectNode>,
}

#[derive(Debug, Deserialize)]
struct ProjectNode {
    runs: RunConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunConnection {
    edges: Vec<RunEdge>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct RunEdge {
    node: RunNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunNode {
    name: String,
    state: RunState,
    config: Option<String>,
    summary_metrics: Option<String>,
    #[serde(default)]
    history: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug)]
pub(super) struct RunPage {
    pub(super) runs: Vec<TrackedRun>,
    pub(super) next_cursor: Option<String>,
}

pub(super) fn decode_page(
    response: GraphQlResponse,
    project: &str,
) -> Result<RunPage, TrackingError> {
    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(TrackingError::GraphQl(messages.join("; ")));
    }

    let connection = response
        .data
        .and_then(|d| d.project)
        .ok_or_else(|| TrackingError::ProjectNotFound(project.to_string()))?
        .runs;

    let runs = connection
        .edges
        .into_iter()
        .map(|edge| decode_run(edge.node))
        .collect::<Result<Vec<_>, _>>()?;

    let next_cursor = if connection.page_info.has_next_page {
        connection.page_info.end_cursor
    } else {
        None
    };

    Ok(RunPage { runs, next_cursor })
}

fn decode_run(node: RunNode) -> Result<TrackedRun, TrackingError> {
    let config = match node.config.as_deref() {
        Some(raw) => unwrap_config(parse_object(raw, &node.name, "config")?),
        None => Value::Object(Map::new()),
    };
    let summary = match node.summary_metrics.as_deref() {
        Some(raw) => parse_object(raw, &node.name, "summaryMetrics")?,
        None => Map::new(),
    };
    let history = node
        .history
        .iter()
        .map(|raw| parse_object(raw, &node.name, "history"))
        .collect::<Result<Vec<HistoryRow>, _>>()?;

    Ok(TrackedRun {
        id: node.name,
        state: node.state,
        config,
        summary,
        history,
    })
}

fn parse_object(raw: &str, run_id: &str, field: &str) -> Result<Map<String, Value>, TrackingError> {
    serde_json::from_str(raw).map_err(|source| TrackingError::Payload {
        context: format!("run {} {}", run_id, field),
        source,
    })
}

/// Stored configs wrap each top-level entry as `{"value": .., "desc": ..}`.
/// Strip the wrapper and drop internal keys (leading underscore).
fn unwrap_config(raw: Map<String, Value>) -> Value {
    let config = raw
        .into_iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| match value {
            Value::Object(mut wrapped) if wrapped.contains_key("value") => {
                let inner = wrapped.remove("value").unwrap_or(Value::Null);
                (key, inner)
            }
            other => (key, other),
        })
        .collect();
    Value::Object(config)
}
