use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use wharf_db::{
    models::jobs::{Job, JobState},
    repository::JobRepository,
};
use wharf_events::{EventSinkHandle, JobOutcome, WharfEvent};
use wharf_utils::time::now_millis;

use crate::{
    database::DieselDatabase,
    error::WharfError,
    tasking::payload::{JobPayload, Operation},
    WharfResult,
};

const LEASE_EXPIRED: &str = "reservation lease expired";

/// A job moved to running, with its reservations held by `worker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    pub job_id: i32,
    pub operation: Operation,
    pub payload: JobPayload,
    pub resources: Vec<String>,
    pub worker: String,
}

/// Externally visible state of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub job_id: i32,
    pub operation: String,
    pub state: JobState,
    pub resources: Vec<String>,
    pub worker: Option<String>,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl JobStatus {
    fn new(job: Job, resources: Vec<String>) -> Self {
        Self {
            job_id: job.id,
            state: job.job_state(),
            operation: job.operation,
            resources,
            worker: job.worker,
            error: job.error,
            result: job.result,
            enqueued_at: job.enqueued_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

/// Moves jobs through their lifecycle: claim, lease renewal, completion, cancellation.
///
/// All state lives in the database, so any number of runtimes (in one process or several
/// sharing the database file) can claim from the same queue.
#[derive(Clone)]
pub struct JobRuntime {
    db: DieselDatabase,
    events: EventSinkHandle,
    lease: Duration,
}

impl JobRuntime {
    pub fn new(db: DieselDatabase, events: EventSinkHandle, lease: Duration) -> Self {
        Self { db, events, lease }
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    fn lease_until(&self, now: i64) -> i64 {
        now.saturating_add(self.lease.as_millis() as i64)
    }

    /// Claims the oldest runnable job for `worker`.
    ///
    /// Jobs whose leases have expired are failed first so their reservations do not block
    /// the queue. Returns `None` when nothing is runnable.
    pub fn claim_next(&self, worker: &str) -> WharfResult<Option<ClaimedJob>> {
        let mut pending = Vec::new();

        let claimed = self.db.transaction(|conn| {
            let now = now_millis();
            pending.extend(Self::recover_expired_in(conn, now)?);

            while let Some((job, resources)) = JobRepository::next_runnable(conn)? {
                if !JobRepository::start(
                    conn,
                    job.id,
                    worker,
                    &resources,
                    self.lease_until(now),
                    now,
                )? {
                    break;
                }

                match serde_json::from_value::<JobPayload>(job.payload.clone()) {
                    Ok(payload) => {
                        return Ok(Some(ClaimedJob {
                            job_id: job.id,
                            operation: payload.operation(),
                            payload,
                            resources,
                            worker: worker.to_string(),
                        }));
                    }
                    Err(err) => {
                        let error = format!("invalid job payload: {err}");
                        JobRepository::fail_running(conn, job.id, &error, now)?;
                        pending.push(WharfEvent::JobFinished {
                            job_id: job.id,
                            operation: job.operation,
                            outcome: JobOutcome::Failed { error },
                        });
                    }
                }
            }

            Ok(None)
        });

        let claimed = claimed?;
        for event in pending {
            self.events.emit(event);
        }
        if let Some(job) = &claimed {
            debug!(job_id = job.job_id, worker, resources = ?job.resources, "claimed job");
            self.events.emit(WharfEvent::JobStarted {
                job_id: job.job_id,
                operation: job.operation.to_string(),
                worker: worker.to_string(),
            });
        }
        Ok(claimed)
    }

    /// Fails every running job whose lease has expired and releases its reservations.
    pub fn recover_expired(&self) -> WharfResult<Vec<i32>> {
        let events = self
            .db
            .transaction(|conn| Self::recover_expired_in(conn, now_millis()))?;

        let mut recovered = Vec::with_capacity(events.len());
        for event in events {
            if let WharfEvent::LeaseExpired { job_id, .. } = &event {
                recovered.push(*job_id);
            }
            self.events.emit(event);
        }
        Ok(recovered)
    }

    fn recover_expired_in(
        conn: &mut diesel::SqliteConnection,
        now: i64,
    ) -> WharfResult<Vec<WharfEvent>> {
        let mut events = Vec::new();
        for job_id in JobRepository::expired_leases(conn, now)? {
            let resources = JobRepository::resources(conn, job_id)?;
            JobRepository::fail_running(conn, job_id, LEASE_EXPIRED, now)?;
            warn!(job_id, ?resources, "{LEASE_EXPIRED}; job failed");
            events.push(WharfEvent::LeaseExpired { job_id, resources });
        }
        Ok(events)
    }

    /// Extends the lease on the job's reservations. Returns false if `worker` no longer
    /// holds them.
    pub fn heartbeat(&self, job_id: i32, worker: &str) -> WharfResult<bool> {
        let renewed = self.db.with_conn(|conn| {
            JobRepository::renew_lease(conn, job_id, worker, self.lease_until(now_millis()))
        })?;
        if renewed > 0 {
            self.events.emit(WharfEvent::LeaseRenewed {
                job_id,
                worker: worker.to_string(),
            });
        }
        Ok(renewed > 0)
    }

    /// Records the handler's outcome and releases the job's reservations.
    ///
    /// Returns false if the job was taken away from `worker` (its lease expired); the
    /// outcome is discarded in that case.
    pub fn complete(
        &self,
        job_id: i32,
        worker: &str,
        outcome: Result<Value, String>,
    ) -> WharfResult<bool> {
        let (state, error, result) = match &outcome {
            Ok(value) => (JobState::Succeeded, None, Some(value.clone())),
            Err(error) => (JobState::Failed, Some(error.as_str()), None),
        };

        let (finished, operation) = self.db.transaction(|conn| {
            let finished =
                JobRepository::finish(conn, job_id, worker, state, error, result, now_millis())?;
            let operation = JobRepository::find(conn, job_id)?
                .map(|job| job.operation)
                .unwrap_or_default();
            Ok((finished, operation))
        })?;

        if !finished {
            warn!(job_id, worker, "job is no longer held by this worker; outcome discarded");
            return Ok(false);
        }

        info!(job_id, %state, "job finished");
        self.events.emit(WharfEvent::JobFinished {
            job_id,
            operation,
            outcome: match outcome {
                Ok(_) => JobOutcome::Succeeded,
                Err(error) => JobOutcome::Failed { error },
            },
        });
        Ok(true)
    }

    /// Cancels a queued job. Finished jobs are left alone and their state returned.
    ///
    /// # Errors
    ///
    /// [`WharfError::NotFound`] for unknown jobs, [`WharfError::JobNotCancelable`] for a
    /// running one.
    pub fn cancel(&self, job_id: i32) -> WharfResult<JobState> {
        let (state, operation, canceled) = self.db.transaction(|conn| {
            let job = JobRepository::find(conn, job_id)?
                .ok_or_else(|| WharfError::not_found("Job", job_id.to_string()))?;
            match job.job_state() {
                JobState::Queued => {
                    JobRepository::cancel_queued(conn, job_id, now_millis())?;
                    Ok((JobState::Canceled, job.operation, true))
                }
                JobState::Running => Err(WharfError::JobNotCancelable { job_id }),
                terminal => Ok((terminal, job.operation, false)),
            }
        })?;

        if canceled {
            info!(job_id, "job canceled");
            self.events.emit(WharfEvent::JobFinished {
                job_id,
                operation,
                outcome: JobOutcome::Canceled,
            });
        }
        Ok(state)
    }

    pub fn status(&self, job_id: i32) -> WharfResult<JobStatus> {
        self.db.read(|conn| {
            let job = JobRepository::find(conn, job_id)?
                .ok_or_else(|| WharfError::not_found("Job", job_id.to_string()))?;
            let resources = JobRepository::resources(conn, job_id)?;
            Ok(JobStatus::new(job, resources))
        })
    }

    /// Jobs in submission order, optionally restricted to one state.
    pub fn list(&self, state: Option<JobState>, limit: Option<i64>) -> WharfResult<Vec<JobStatus>> {
        self.db.read(|conn| {
            let jobs = JobRepository::list(conn, state, limit)?;
            jobs.into_iter()
                .map(|job| -> WharfResult<JobStatus> {
                    let resources = JobRepository::resources(conn, job.id)?;
                    Ok(JobStatus::new(job, resources))
                })
                .collect()
        })
    }

    pub fn has_queued(&self) -> WharfResult<bool> {
        let queued = self
            .db
            .with_conn(|conn| JobRepository::list(conn, Some(JobState::Queued), Some(1)))?;
        Ok(!queued.is_empty())
    }
}
