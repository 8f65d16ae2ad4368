use nu_ansi_term::Color::{Cyan, Green};
use tracing::{info, warn};
use wharf_core::{
    tasking::{JobHandle, JobState, JobStatus, PublishRequest, SyncRequest},
    WharfResult,
};
use wharf_operations::{jobs, WharfContext, WorkerRunOptions};

use crate::{
    cli::PublishArgs,
    utils::{
        colored_state, format_millis, json_output, or_dash, print_json, print_record,
        print_table, Colored,
    },
};

fn report_accepted(handle: &JobHandle) -> WharfResult<()> {
    if json_output() {
        return print_json(handle);
    }

    info!(
        "{} job #{} ({}) on {}",
        Colored(Green, "Queued"),
        Colored(Cyan, handle.job_id),
        handle.operation,
        handle.resources.join(", ")
    );
    Ok(())
}

pub fn sync(ctx: &WharfContext, repository: String, remote: String, mirror: bool) -> WharfResult<()> {
    let handle = jobs::trigger_sync(
        ctx,
        &SyncRequest {
            repository,
            remote,
            mirror,
        },
    )?;
    report_accepted(&handle)
}

pub fn publish(ctx: &WharfContext, args: PublishArgs) -> WharfResult<()> {
    let handle = jobs::trigger_publish(
        ctx,
        &PublishRequest {
            publisher: args.publisher,
            repository_version: args.repository_version,
            repository: args.repository,
        },
    )?;
    report_accepted(&handle)
}

pub fn job_status(ctx: &WharfContext, job_id: i32) -> WharfResult<()> {
    let status = jobs::job_status(ctx, job_id)?;

    if json_output() {
        return print_json(&status);
    }

    print_record(&format!("Job #{}", status.job_id), status_fields(status));
    Ok(())
}

fn status_fields(status: JobStatus) -> Vec<(&'static str, String)> {
    vec![
        ("Operation", status.operation),
        ("State", colored_state(status.state)),
        ("Resources", status.resources.join("\n")),
        ("Worker", or_dash(status.worker)),
        ("Enqueued", format_millis(status.enqueued_at)),
        ("Started", or_dash(status.started_at.map(format_millis))),
        ("Finished", or_dash(status.finished_at.map(format_millis))),
        ("Error", or_dash(status.error)),
        (
            "Result",
            or_dash(
                status
                    .result
                    .and_then(|result| serde_json::to_string_pretty(&result).ok()),
            ),
        ),
    ]
}

pub fn list_jobs(ctx: &WharfContext, state: Option<JobState>, limit: Option<i64>) -> WharfResult<()> {
    let statuses = jobs::list_jobs(ctx, state, limit)?;

    if json_output() {
        return print_json(&statuses);
    }

    let rows = statuses
        .into_iter()
        .map(|status| {
            [
                status.job_id.to_string(),
                status.operation,
                colored_state(status.state),
                status.resources.join(", "),
                format_millis(status.enqueued_at),
            ]
        })
        .collect();
    print_table(
        "Jobs",
        &["ID", "Operation", "State", "Resources", "Enqueued"],
        rows,
    );
    Ok(())
}

pub fn cancel_job(ctx: &WharfContext, job_id: i32) -> WharfResult<()> {
    let state = jobs::cancel_job(ctx, job_id)?;

    if json_output() {
        return print_json(&serde_json::json!({ "job_id": job_id, "state": state }));
    }

    if state == JobState::Canceled {
        info!("{} job #{job_id}", Colored(Green, "Canceled"));
    } else {
        warn!("Job #{job_id} already finished as {}", colored_state(state));
    }
    Ok(())
}

pub fn recover_jobs(ctx: &WharfContext) -> WharfResult<()> {
    let recovered = jobs::recover_jobs(ctx)?;

    if json_output() {
        return print_json(&recovered);
    }

    if recovered.is_empty() {
        info!("No expired reservations");
    } else {
        let ids = recovered
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(", ");
        info!("{} {ids}", Colored(Green, "Recovered"));
    }
    Ok(())
}

pub async fn run_workers(ctx: &WharfContext, drain: bool, workers: Option<usize>) -> WharfResult<()> {
    let options = WorkerRunOptions {
        workers,
        drain,
    };

    let processed = jobs::run_workers(ctx, &options, async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Unable to listen for ctrl-c; stop the workers with a signal");
            std::future::pending::<()>().await;
        }
        info!("Shutting down workers");
    })
    .await?;

    if json_output() {
        return print_json(&serde_json::json!({ "processed": processed }));
    }

    info!("Processed {} jobs", Colored(Cyan, processed));
    Ok(())
}
