use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use serde_json::Value;
use tokio::{
    sync::watch,
    time::{interval_at, sleep, Instant},
};
use tracing::{debug, error, info, warn};
use wharf_events::EventSinkHandle;

use crate::{
    database::DieselDatabase,
    error::WharfError,
    tasking::{
        handlers::{HandlerRegistry, JobContext},
        runtime::{ClaimedJob, JobRuntime},
    },
    WharfResult,
};

const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Number of concurrent worker tasks.
    pub workers: usize,
    /// Sleep between claim attempts while nothing is runnable.
    pub poll_interval: Duration,
    /// Worker names are `<prefix>-<pid>-<n>`.
    pub name_prefix: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_interval: Duration::from_secs(1),
            name_prefix: "worker".into(),
        }
    }
}

enum Mode {
    Drain,
    UntilShutdown(watch::Receiver<bool>),
}

struct PoolInner {
    runtime: JobRuntime,
    handlers: HandlerRegistry,
    db: DieselDatabase,
    events: EventSinkHandle,
    options: WorkerOptions,
    in_flight: AtomicUsize,
}

/// A set of tokio tasks claiming and executing jobs.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    pub fn new(
        runtime: JobRuntime,
        handlers: HandlerRegistry,
        db: DieselDatabase,
        events: EventSinkHandle,
        options: WorkerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                runtime,
                handlers,
                db,
                events,
                options,
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Runs jobs until the queue holds nothing this pool can make progress on.
    ///
    /// Returns the number of jobs executed.
    pub async fn run_until_idle(&self) -> WharfResult<usize> {
        let handles = (0..self.inner.options.workers.max(1))
            .map(|n| {
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.work(n, Mode::Drain).await })
            })
            .collect::<Vec<_>>();

        let mut processed = 0;
        for handle in handles {
            processed += handle
                .await
                .map_err(|err| WharfError::Worker(err.to_string()))??;
        }
        Ok(processed)
    }

    /// Runs jobs until `shutdown` resolves. Jobs already executing are finished first.
    pub async fn run<F>(&self, shutdown: F) -> WharfResult<usize>
    where
        F: Future<Output = ()>,
    {
        let (tx, rx) = watch::channel(false);
        let handles = (0..self.inner.options.workers.max(1))
            .map(|n| {
                let inner = self.inner.clone();
                let rx = rx.clone();
                tokio::spawn(async move { inner.work(n, Mode::UntilShutdown(rx)).await })
            })
            .collect::<Vec<_>>();

        shutdown.await;
        info!("shutting down workers");
        let _ = tx.send(true);

        let mut processed = 0;
        for handle in handles {
            processed += handle
                .await
                .map_err(|err| WharfError::Worker(err.to_string()))??;
        }
        Ok(processed)
    }
}

impl PoolInner {
    /// Runs a runtime call on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> WharfResult<T>
    where
        F: FnOnce(&JobRuntime) -> WharfResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let runtime = self.runtime.clone();
        tokio::task::spawn_blocking(move || f(&runtime))
            .await
            .map_err(|err| WharfError::Worker(err.to_string()))?
    }

    async fn work(self: Arc<Self>, n: usize, mut mode: Mode) -> WharfResult<usize> {
        let name = format!("{}-{}-{n}", self.options.name_prefix, std::process::id());
        debug!(worker = %name, "worker started");
        let mut processed = 0;

        loop {
            if let Mode::UntilShutdown(rx) = &mode {
                if *rx.borrow() {
                    break;
                }
            }

            // Counted from before the claim so a concurrent idle check sees this worker.
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let worker = name.clone();
            let claimed = self
                .blocking(move |runtime| runtime.claim_next(&worker))
                .await;

            let claimed = match (claimed, &mode) {
                (Ok(claimed), _) => claimed,
                (Err(err), Mode::Drain) => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(err);
                }
                (Err(err), Mode::UntilShutdown(_)) => {
                    error!(worker = %name, "failed to claim job: {err}");
                    None
                }
            };

            if let Some(job) = claimed {
                let result = self.execute(&name, job).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                result?;
                processed += 1;
                continue;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match &mut mode {
                Mode::Drain => {
                    let busy = self.in_flight.load(Ordering::SeqCst) > 0;
                    if !busy || !self.blocking(JobRuntime::has_queued).await? {
                        break;
                    }
                    sleep(self.options.poll_interval).await;
                }
                Mode::UntilShutdown(rx) => {
                    tokio::select! {
                        _ = sleep(self.options.poll_interval) => {}
                        _ = rx.changed() => {}
                    }
                }
            }
        }

        debug!(worker = %name, processed, "worker stopped");
        Ok(processed)
    }

    async fn execute(&self, worker: &str, job: ClaimedJob) -> WharfResult<()> {
        let job_id = job.job_id;
        info!(job_id, operation = %job.operation, worker, "running job");

        let mut lost = false;
        let outcome: Result<Value, String> = match self.handlers.get(job.operation) {
            None => Err(format!("no handler registered for {}", job.operation)),
            Some(handler) => {
                let ctx = JobContext {
                    job_id,
                    worker: worker.to_string(),
                    db: self.db.clone(),
                    events: self.events.clone(),
                };
                let payload = job.payload;
                let mut task = tokio::task::spawn_blocking(move || handler.run(&ctx, &payload));

                let period = (self.runtime.lease() / 3).max(MIN_HEARTBEAT);
                let mut ticker = interval_at(Instant::now() + period, period);

                loop {
                    tokio::select! {
                        joined = &mut task => {
                            break match joined {
                                Ok(Ok(detail)) => Ok(detail),
                                Ok(Err(err)) => Err(err.to_string()),
                                Err(err) => Err(format!("handler aborted: {err}")),
                            };
                        }
                        _ = ticker.tick(), if !lost => {
                            let owner = worker.to_string();
                            let renewed = self
                                .blocking(move |runtime| runtime.heartbeat(job_id, &owner))
                                .await;
                            match renewed {
                                Ok(true) => {}
                                Ok(false) => {
                                    warn!(job_id, worker, "reservation lease lost");
                                    lost = true;
                                }
                                Err(err) => warn!(job_id, worker, "heartbeat failed: {err}"),
                            }
                        }
                    }
                }
            }
        };

        // Another worker may own the resources now; the recovered job's state stands.
        if lost {
            warn!(job_id, worker, "lease lost while running; outcome discarded");
            return Ok(());
        }

        if let Err(error) = &outcome {
            warn!(job_id, worker, "job failed: {error}");
        }
        let owner = worker.to_string();
        self.blocking(move |runtime| runtime.complete(job_id, &owner, outcome))
            .await?;
        Ok(())
    }
}
