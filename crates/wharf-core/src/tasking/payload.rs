use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Operations the dispatcher accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Sync,
    Publish,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Sync => "sync",
            Operation::Publish => "publish",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Operation::Sync),
            "publish" => Ok(Operation::Publish),
            other => Err(format!("unknown operation `{other}`")),
        }
    }
}

/// Synchronize a repository from a remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub repository: String,
    pub remote: String,
    /// Replace the repository's content instead of adding to it.
    #[serde(default)]
    pub mirror: bool,
}

/// A specific version of a named repository, written `name@number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub repository: String,
    pub number: i32,
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repository, self.number)
    }
}

impl FromStr for VersionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (repository, number) = s
            .rsplit_once('@')
            .ok_or_else(|| format!("`{s}` is not of the form repository@number"))?;
        if repository.is_empty() {
            return Err(format!("`{s}` has an empty repository name"));
        }
        let number = number
            .parse::<i32>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or_else(|| format!("`{number}` is not a valid version number"))?;
        Ok(Self {
            repository: repository.to_string(),
            number,
        })
    }
}

/// Publish request as received from a caller: exactly one of `repository_version` and
/// `repository` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub publisher: String,
    pub repository_version: Option<VersionRef>,
    pub repository: Option<String>,
}

/// Validated publish target stored with the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPayload {
    pub publisher: String,
    pub repository: String,
    /// Explicit version number; `None` publishes the latest version at run time.
    pub version: Option<i32>,
}

/// Everything a handler needs to run a job, stored as the job's JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum JobPayload {
    Sync(SyncRequest),
    Publish(PublishPayload),
}

impl JobPayload {
    pub fn operation(&self) -> Operation {
        match self {
            JobPayload::Sync(_) => Operation::Sync,
            JobPayload::Publish(_) => Operation::Publish,
        }
    }
}
