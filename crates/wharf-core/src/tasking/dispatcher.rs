use std::collections::BTreeSet;

use diesel::SqliteConnection;
use serde::Serialize;
use tracing::debug;
use wharf_db::{
    models::jobs::JobState,
    repository::{JobRepository, LedgerRepository},
};
use wharf_events::{EventSinkHandle, WharfEvent};
use wharf_utils::time::now_millis;

use crate::{
    database::DieselDatabase,
    error::WharfError,
    tasking::{
        payload::{JobPayload, Operation, PublishPayload, PublishRequest, SyncRequest},
        resource::ResourceId,
    },
    WharfResult,
};

/// Reference to a queued job, returned as soon as the job is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub job_id: i32,
    pub operation: Operation,
    pub state: JobState,
    pub resources: Vec<String>,
}

/// Accepts mutating operations and queues them behind the resources they touch.
#[derive(Clone)]
pub struct ReservationDispatcher {
    db: DieselDatabase,
    events: EventSinkHandle,
}

impl ReservationDispatcher {
    pub fn new(db: DieselDatabase, events: EventSinkHandle) -> Self {
        Self { db, events }
    }

    /// Queues `payload` under `resources` without validating the named records.
    ///
    /// # Errors
    ///
    /// [`WharfError::InvalidRequest`] if `resources` is empty or `operation` does not match
    /// the payload.
    pub fn dispatch(
        &self,
        operation: Operation,
        resources: &BTreeSet<ResourceId>,
        payload: &JobPayload,
    ) -> WharfResult<JobHandle> {
        if payload.operation() != operation {
            return Err(WharfError::InvalidRequest(format!(
                "{} payload submitted as a {operation} job",
                payload.operation()
            )));
        }
        self.enqueue(resources, payload, |_| Ok(()))
    }

    /// Queues a sync of `request.repository` from `request.remote`.
    pub fn dispatch_sync(&self, request: &SyncRequest) -> WharfResult<JobHandle> {
        if request.repository.is_empty() || request.remote.is_empty() {
            return Err(WharfError::InvalidRequest(
                "sync requires a repository and a remote".into(),
            ));
        }

        let resources = BTreeSet::from([
            ResourceId::repository(&request.repository),
            ResourceId::remote(&request.remote),
        ]);
        let payload = JobPayload::Sync(request.clone());

        self.enqueue(&resources, &payload, |conn| {
            if LedgerRepository::find_repository(conn, &request.repository)?.is_none() {
                return Err(WharfError::not_found("Repository", &request.repository));
            }
            if LedgerRepository::find_remote(conn, &request.remote)?.is_none() {
                return Err(WharfError::not_found("Remote", &request.remote));
            }
            Ok(())
        })
    }

    /// Queues a publication of an explicit repository version, or of whatever version is
    /// latest when the job runs.
    ///
    /// # Errors
    ///
    /// [`WharfError::InvalidRequest`] unless exactly one of `repository_version` and
    /// `repository` is given; [`WharfError::NotFound`] for unknown records.
    pub fn dispatch_publish(&self, request: &PublishRequest) -> WharfResult<JobHandle> {
        if request.publisher.is_empty() {
            return Err(WharfError::InvalidRequest("publish requires a publisher".into()));
        }

        let payload = match (&request.repository_version, &request.repository) {
            (Some(version), None) => PublishPayload {
                publisher: request.publisher.clone(),
                repository: version.repository.clone(),
                version: Some(version.number),
            },
            (None, Some(repository)) => PublishPayload {
                publisher: request.publisher.clone(),
                repository: repository.clone(),
                version: None,
            },
            _ => {
                return Err(WharfError::InvalidRequest(
                    "exactly one of repository_version or repository must be specified".into(),
                ))
            }
        };

        let resources = BTreeSet::from([
            ResourceId::repository(&payload.repository),
            ResourceId::publisher(&payload.publisher),
        ]);

        let validate = |conn: &mut SqliteConnection| -> WharfResult<()> {
            if LedgerRepository::find_publisher(conn, &payload.publisher)?.is_none() {
                return Err(WharfError::not_found("Publisher", &payload.publisher));
            }
            let repository = LedgerRepository::find_repository(conn, &payload.repository)?
                .ok_or_else(|| WharfError::not_found("Repository", &payload.repository))?;
            if let Some(number) = payload.version {
                if LedgerRepository::find_version(conn, repository.id, number)?.is_none() {
                    return Err(WharfError::not_found(
                        "Repository version",
                        format!("{}@{number}", payload.repository),
                    ));
                }
            }
            Ok(())
        };

        self.enqueue(&resources, &JobPayload::Publish(payload.clone()), validate)
    }

    fn enqueue<F>(
        &self,
        resources: &BTreeSet<ResourceId>,
        payload: &JobPayload,
        validate: F,
    ) -> WharfResult<JobHandle>
    where
        F: FnOnce(&mut SqliteConnection) -> WharfResult<()>,
    {
        if resources.is_empty() {
            return Err(WharfError::InvalidRequest(
                "a job must reserve at least one resource".into(),
            ));
        }

        let operation = payload.operation();
        let resources: Vec<String> = resources.iter().map(ToString::to_string).collect();
        let value = serde_json::to_value(payload)?;

        let job = self.db.transaction(|conn| {
            validate(conn)?;
            Ok(JobRepository::enqueue(
                conn,
                operation.as_str(),
                value,
                &resources,
                now_millis(),
            )?)
        })?;

        debug!(job_id = job.id, %operation, ?resources, "queued job");
        self.events.emit(WharfEvent::JobQueued {
            job_id: job.id,
            operation: operation.to_string(),
            resources: resources.clone(),
        });

        Ok(JobHandle {
            job_id: job.id,
            operation,
            state: JobState::Queued,
            resources,
        })
    }
}
