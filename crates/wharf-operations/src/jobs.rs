use std::future::Future;

use tracing::{debug, info};
use wharf_core::{
    tasking::{JobHandle, JobState, JobStatus, PublishRequest, SyncRequest},
    WharfResult,
};

use crate::{WharfContext, WorkerRunOptions};

/// Queues a sync and returns immediately with the job handle.
pub fn trigger_sync(ctx: &WharfContext, request: &SyncRequest) -> WharfResult<JobHandle> {
    let handle = ctx.dispatcher()?.dispatch_sync(request)?;
    info!(
        job_id = handle.job_id,
        repository = %request.repository,
        remote = %request.remote,
        "sync accepted"
    );
    Ok(handle)
}

/// Queues a publication and returns immediately with the job handle.
pub fn trigger_publish(ctx: &WharfContext, request: &PublishRequest) -> WharfResult<JobHandle> {
    let handle = ctx.dispatcher()?.dispatch_publish(request)?;
    info!(job_id = handle.job_id, publisher = %request.publisher, "publish accepted");
    Ok(handle)
}

pub fn job_status(ctx: &WharfContext, job_id: i32) -> WharfResult<JobStatus> {
    ctx.runtime()?.status(job_id)
}

pub fn list_jobs(
    ctx: &WharfContext,
    state: Option<JobState>,
    limit: Option<i64>,
) -> WharfResult<Vec<JobStatus>> {
    ctx.runtime()?.list(state, limit)
}

/// Cancels a queued job; returns the job's state afterwards.
pub fn cancel_job(ctx: &WharfContext, job_id: i32) -> WharfResult<JobState> {
    ctx.runtime()?.cancel(job_id)
}

/// Fails running jobs whose lease has expired. Returns their ids.
pub fn recover_jobs(ctx: &WharfContext) -> WharfResult<Vec<i32>> {
    ctx.runtime()?.recover_expired()
}

/// Runs queued jobs. With `drain`, returns once nothing runnable is left; otherwise runs
/// until `shutdown` resolves. Returns the number of jobs executed.
pub async fn run_workers<F>(
    ctx: &WharfContext,
    options: &WorkerRunOptions,
    shutdown: F,
) -> WharfResult<usize>
where
    F: Future<Output = ()>,
{
    let pool = ctx.worker_pool(options.workers)?;
    debug!(drain = options.drain, "starting workers");

    let processed = if options.drain {
        pool.run_until_idle().await?
    } else {
        pool.run(shutdown).await?
    };

    info!(processed, "workers finished");
    Ok(processed)
}
