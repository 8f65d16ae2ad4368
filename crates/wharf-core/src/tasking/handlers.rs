use std::{collections::HashMap, sync::Arc};

use diesel::SqliteConnection;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use wharf_db::{
    models::ledger::{NewPublication, Remote},
    repository::{ContentRepository, JobRepository, LedgerRepository},
};
use wharf_events::EventSinkHandle;
use wharf_utils::time::now_millis;

use crate::{
    database::DieselDatabase,
    error::WharfError,
    tasking::payload::{JobPayload, Operation, PublishPayload, SyncRequest},
    utils::timestamp,
    WharfResult,
};

/// Handler result stored on the job as its `result` JSON.
pub type JobOutcomeDetail = Value;

/// What a handler can see of the job it runs.
#[derive(Clone)]
pub struct JobContext {
    pub job_id: i32,
    pub worker: String,
    pub db: DieselDatabase,
    pub events: EventSinkHandle,
}

impl JobContext {
    /// Fails with [`WharfError::LeaseLost`] once the job's reservations were recovered or
    /// its lease ran out. Call it first inside every write transaction.
    pub fn ensure_held(&self, conn: &mut SqliteConnection) -> WharfResult<()> {
        if JobRepository::holds(conn, self.job_id, &self.worker, now_millis())? {
            Ok(())
        } else {
            Err(WharfError::LeaseLost {
                job_id: self.job_id,
            })
        }
    }
}

/// Executes one kind of job. Runs on a blocking thread while the worker holds the job's
/// reservations.
pub trait JobHandler: Send + Sync {
    fn run(&self, ctx: &JobContext, payload: &JobPayload) -> WharfResult<JobOutcomeDetail>;
}

/// Source of content for a sync. Returns ids of content units the remote contributes.
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, ctx: &JobContext, remote: &Remote) -> WharfResult<Vec<i32>>;
}

/// Fetcher that contributes nothing; a sync then only snapshots the repository.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFetcher;

impl RemoteFetcher for NoopFetcher {
    fn fetch(&self, _ctx: &JobContext, remote: &Remote) -> WharfResult<Vec<i32>> {
        debug!(remote = %remote.name, "no fetcher configured; remote contributes no content");
        Ok(Vec::new())
    }
}

pub struct SyncHandler {
    fetcher: Arc<dyn RemoteFetcher>,
}

impl SyncHandler {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self { fetcher }
    }

    fn sync(&self, ctx: &JobContext, request: &SyncRequest) -> WharfResult<JobOutcomeDetail> {
        let remote = ctx
            .db
            .with_conn(|conn| LedgerRepository::find_remote(conn, &request.remote))?
            .ok_or_else(|| WharfError::not_found("Remote", &request.remote))?;

        let fetched = self.fetcher.fetch(ctx, &remote)?;

        let (version, content_count) = ctx.db.transaction(|conn| {
            ctx.ensure_held(conn)?;
            let repository = LedgerRepository::find_repository(conn, &request.repository)?
                .ok_or_else(|| WharfError::not_found("Repository", &request.repository))?;

            let mut content = if request.mirror {
                Vec::new()
            } else {
                match LedgerRepository::latest_version(conn, repository.id)? {
                    Some(latest) => LedgerRepository::version_content_ids(conn, latest.id)?,
                    None => Vec::new(),
                }
            };

            let known = ContentRepository::existing_ids(conn, &fetched)?;
            if known.len() < fetched.len() {
                warn!(
                    remote = %remote.name,
                    skipped = fetched.len() - known.len(),
                    "remote returned unknown content ids"
                );
            }
            content.extend(known);

            let version =
                LedgerRepository::create_version(conn, repository.id, &content, &timestamp())?;
            let count = LedgerRepository::count_version_content(conn, version.id)?;
            Ok((version, count))
        })?;

        info!(
            repository = %request.repository,
            remote = %request.remote,
            version = version.number,
            content_count,
            "synced repository"
        );

        Ok(json!({
            "repository": request.repository,
            "remote": request.remote,
            "version": version.number,
            "content_count": content_count,
            "mirror": request.mirror,
        }))
    }
}

impl JobHandler for SyncHandler {
    fn run(&self, ctx: &JobContext, payload: &JobPayload) -> WharfResult<JobOutcomeDetail> {
        match payload {
            JobPayload::Sync(request) => self.sync(ctx, request),
            other => Err(mismatch(Operation::Sync, other)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PublishHandler;

impl PublishHandler {
    fn publish(ctx: &JobContext, target: &PublishPayload) -> WharfResult<JobOutcomeDetail> {
        let (publication, number) = ctx.db.transaction(|conn| {
            ctx.ensure_held(conn)?;
            let publisher = LedgerRepository::find_publisher(conn, &target.publisher)?
                .ok_or_else(|| WharfError::not_found("Publisher", &target.publisher))?;
            let repository = LedgerRepository::find_repository(conn, &target.repository)?
                .ok_or_else(|| WharfError::not_found("Repository", &target.repository))?;

            let version = match target.version {
                Some(number) => LedgerRepository::find_version(conn, repository.id, number)?
                    .ok_or_else(|| {
                        WharfError::not_found(
                            "Repository version",
                            format!("{}@{number}", target.repository),
                        )
                    })?,
                None => LedgerRepository::latest_version(conn, repository.id)?
                    .ok_or_else(|| WharfError::not_found("Repository version", &target.repository))?,
            };

            let publication = LedgerRepository::insert_publication(
                conn,
                &NewPublication {
                    publisher_id: publisher.id,
                    repository_version_id: version.id,
                    job_id: Some(ctx.job_id),
                    created_at: &timestamp(),
                },
            )?;
            Ok((publication, version.number))
        })?;

        info!(
            publisher = %target.publisher,
            repository = %target.repository,
            version = number,
            "published repository version"
        );

        Ok(json!({
            "publication": publication.id,
            "publisher": target.publisher,
            "repository": target.repository,
            "version": number,
        }))
    }
}

impl JobHandler for PublishHandler {
    fn run(&self, ctx: &JobContext, payload: &JobPayload) -> WharfResult<JobOutcomeDetail> {
        match payload {
            JobPayload::Publish(target) => Self::publish(ctx, target),
            other => Err(mismatch(Operation::Publish, other)),
        }
    }
}

fn mismatch(expected: Operation, payload: &JobPayload) -> WharfError {
    WharfError::Worker(format!(
        "{expected} handler received a {} payload",
        payload.operation()
    ))
}

/// Handlers keyed by operation.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Operation, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync and publish handlers, with `fetcher` supplying remote content.
    pub fn with_defaults(fetcher: Arc<dyn RemoteFetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(Operation::Sync, Arc::new(SyncHandler::new(fetcher)));
        registry.register(Operation::Publish, Arc::new(PublishHandler));
        registry
    }

    pub fn register(&mut self, operation: Operation, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(operation, handler);
    }

    pub fn get(&self, operation: Operation) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&operation).cloned()
    }
}
