use std::sync::{Arc, OnceLock};

use tracing::debug;
use wharf_config::config::Config;
use wharf_core::{
    artifact::FileArtifactStore,
    content::ContentRegistrar,
    database::DieselDatabase,
    tasking::{
        HandlerRegistry, JobRuntime, NoopFetcher, RemoteFetcher, ReservationDispatcher,
        WorkerOptions, WorkerPool,
    },
    WharfResult,
};
use wharf_events::EventSinkHandle;
use wharf_package::{ReaderOptions, ReaderRegistry};

struct ContextInner {
    config: Config,
    events: EventSinkHandle,
    db: OnceLock<DieselDatabase>,
    store: OnceLock<Arc<FileArtifactStore>>,
    fetcher: Arc<dyn RemoteFetcher>,
}

/// Shared state for every operation: configuration, the event sink, and lazily opened
/// database and artifact store.
#[derive(Clone)]
pub struct WharfContext {
    inner: Arc<ContextInner>,
}

impl WharfContext {
    pub fn new(config: Config, events: EventSinkHandle) -> Self {
        Self::with_fetcher(config, events, Arc::new(NoopFetcher))
    }

    /// Like [`WharfContext::new`], with `fetcher` supplying content to sync jobs.
    pub fn with_fetcher(
        config: Config,
        events: EventSinkHandle,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                events,
                db: OnceLock::new(),
                store: OnceLock::new(),
                fetcher,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.inner.events
    }

    /// Opens the database on first use, applying migrations.
    pub fn db(&self) -> WharfResult<DieselDatabase> {
        if let Some(db) = self.inner.db.get() {
            return Ok(db.clone());
        }

        let path = self.inner.config.get_db_path()?;
        debug!(path = %path.display(), "opening database");
        let db = DieselDatabase::open(&path, self.inner.config.get_busy_timeout()?)?;
        Ok(self.inner.db.get_or_init(|| db).clone())
    }

    pub fn artifact_store(&self) -> WharfResult<Arc<FileArtifactStore>> {
        if let Some(store) = self.inner.store.get() {
            return Ok(store.clone());
        }

        let store = Arc::new(FileArtifactStore::new(
            self.inner.config.get_artifacts_path()?,
            self.db()?,
        ));
        Ok(self.inner.store.get_or_init(|| store).clone())
    }

    pub fn registrar(&self) -> WharfResult<ContentRegistrar> {
        let readers = ReaderRegistry::with_options(ReaderOptions {
            max_metadata_size: self.inner.config.get_max_metadata_size(),
        });
        Ok(ContentRegistrar::new(
            self.db()?,
            self.artifact_store()?,
            readers,
            self.inner.config.get_workspace_path()?,
            self.inner.events.clone(),
        ))
    }

    pub fn dispatcher(&self) -> WharfResult<ReservationDispatcher> {
        Ok(ReservationDispatcher::new(
            self.db()?,
            self.inner.events.clone(),
        ))
    }

    pub fn runtime(&self) -> WharfResult<JobRuntime> {
        Ok(JobRuntime::new(
            self.db()?,
            self.inner.events.clone(),
            self.inner.config.get_reservation_lease()?,
        ))
    }

    /// A worker pool sized and paced by the configuration.
    pub fn worker_pool(&self, workers: Option<usize>) -> WharfResult<WorkerPool> {
        let options = WorkerOptions {
            workers: workers.unwrap_or_else(|| self.inner.config.get_workers()),
            poll_interval: self.inner.config.get_poll_interval()?,
            ..Default::default()
        };
        Ok(WorkerPool::new(
            self.runtime()?,
            HandlerRegistry::with_defaults(self.inner.fetcher.clone()),
            self.db()?,
            self.inner.events.clone(),
            options,
        ))
    }
}
