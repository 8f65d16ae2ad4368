use std::{fmt, str::FromStr};

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{job_resources, jobs, reservations};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobState {
    /// States that still hold (or wait for) a reservation.
    pub const ACTIVE: [JobState; 2] = [JobState::Queued, JobState::Running];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Queued | JobState::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "running" => Ok(JobState::Running),
            "succeeded" => Ok(JobState::Succeeded),
            "failed" => Ok(JobState::Failed),
            "canceled" => Ok(JobState::Canceled),
            other => Err(format!("unknown job state `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Job {
    pub id: i32,
    pub operation: String,
    pub state: String,
    pub payload: Value,
    pub worker: Option<String>,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl Job {
    /// Parsed [`JobState`]; rows with an unknown state read as failed.
    pub fn job_state(&self) -> JobState {
        self.state.parse().unwrap_or(JobState::Failed)
    }
}

#[derive(Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob<'a> {
    pub operation: &'a str,
    pub state: &'a str,
    pub payload: Value,
    pub enqueued_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = job_resources)]
pub struct NewJobResource<'a> {
    pub job_id: i32,
    pub resource: &'a str,
}

/// An execution-time lock on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = reservations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Reservation {
    pub resource: String,
    pub job_id: i32,
    pub worker: String,
    pub lease_expires_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = reservations)]
pub struct NewReservation<'a> {
    pub resource: &'a str,
    pub job_id: i32,
    pub worker: &'a str,
    pub lease_expires_at: i64,
}
