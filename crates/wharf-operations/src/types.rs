use serde::Serialize;
use wharf_core::tasking::VersionRef;
use wharf_db::models::ledger::Repository;

// ---- Content ----

/// Filters for listing content.
///
/// Each entry in `filters` is `field[__lookup]=value`. Fields and their lookups:
///
/// | field         | lookups                    |
/// |---------------|----------------------------|
/// | `type`        | `exact`, `in`              |
/// | `name`        | `exact`, `in`              |
/// | `author`      | `exact`, `in`              |
/// | `packagetype` | `exact`, `in`              |
/// | `filename`    | `exact`, `in`, `contains`  |
/// | `keywords`    | `in`, `contains`           |
///
/// Without a lookup, `exact` is used. Values for `in` are comma separated.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub filters: Vec<String>,
    /// Only content present in this repository version.
    pub repository_version: Option<VersionRef>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---- Ledger ----

/// A repository with its latest version.
#[derive(Debug, Clone, Serialize)]
pub struct RepositorySummary {
    #[serde(flatten)]
    pub repository: Repository,
    pub latest_version: i32,
    pub content_count: i64,
}

/// Filters for listing remotes, written like [`ContentQuery`] filters.
///
/// | field          | lookups                             |
/// |----------------|-------------------------------------|
/// | `name`         | `exact`, `in`                       |
/// | `last_updated` | `lt`, `lte`, `gt`, `gte`, `range`   |
///
/// Timestamps are RFC 3339 or `YYYY-MM-DD`. `range` takes two comma separated timestamps
/// and includes both ends. Bounds on `last_updated` combine.
#[derive(Debug, Clone, Default)]
pub struct RemoteQuery {
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSummary {
    pub repository: String,
    pub number: i32,
    pub content_count: i64,
    pub created_at: String,
}

// ---- Workers ----

#[derive(Debug, Clone, Default)]
pub struct WorkerRunOptions {
    /// Overrides the configured worker count.
    pub workers: Option<usize>,
    /// Exit once the queue is drained instead of waiting for shutdown.
    pub drain: bool,
}
