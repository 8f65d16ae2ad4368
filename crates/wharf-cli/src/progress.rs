use std::{sync::mpsc::Receiver, thread::JoinHandle};

use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use tracing::{debug, error, info, warn};
use wharf_events::{ContentStage, JobOutcome, LogLevel, WharfEvent};

use crate::utils::Colored;

/// Owns the thread that reports events from a [`ChannelSink`](wharf_events::ChannelSink).
///
/// Drop the context holding the sender before calling [`finish`](EventGuard::finish), or the
/// thread keeps waiting for events.
pub struct EventGuard {
    handle: Option<JoinHandle<()>>,
}

impl EventGuard {
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

pub fn spawn_event_handler(receiver: Receiver<WharfEvent>) -> EventGuard {
    let handle = std::thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            report(event);
        }
    });

    EventGuard {
        handle: Some(handle),
    }
}

fn report(event: WharfEvent) {
    match event {
        WharfEvent::Content {
            filename,
            stage,
        } => {
            match stage {
                ContentStage::Detecting => debug!("{filename}: detecting format"),
                ContentStage::Extracting {
                    packagetype,
                } => debug!("{filename}: extracting {packagetype} metadata"),
                ContentStage::Normalizing => debug!("{filename}: normalizing metadata"),
                ContentStage::Persisting => debug!("{filename}: saving content"),
            }
        }
        WharfEvent::ContentCreated {
            content_id,
            name,
            version,
            packagetype,
            ..
        } => {
            debug!("created {name}-{version} ({packagetype}) as #{content_id}");
        }
        WharfEvent::ContentRejected {
            filename,
            reason,
        } => {
            warn!("{filename} rejected: {reason}");
        }
        WharfEvent::JobQueued {
            job_id,
            operation,
            resources,
        } => {
            debug!("job #{job_id} ({operation}) queued on {}", resources.join(", "));
        }
        WharfEvent::JobStarted {
            job_id,
            operation,
            worker,
        } => {
            info!(
                "{} job #{job_id} ({operation}) on {worker}",
                Colored(Cyan, "Started")
            );
        }
        WharfEvent::LeaseRenewed {
            job_id,
            worker,
        } => {
            debug!("{worker} renewed lease for job #{job_id}");
        }
        WharfEvent::JobFinished {
            job_id,
            operation,
            outcome,
        } => {
            match outcome {
                JobOutcome::Succeeded => {
                    info!(
                        "{} job #{job_id} ({operation})",
                        Colored(Green, "Finished")
                    )
                }
                JobOutcome::Failed {
                    error,
                } => error!("job #{job_id} ({operation}) failed: {error}"),
                JobOutcome::Canceled => {
                    info!(
                        "{} job #{job_id} ({operation})",
                        Colored(Yellow, "Canceled")
                    )
                }
            }
        }
        WharfEvent::LeaseExpired {
            job_id,
            resources,
        } => {
            warn!(
                "{} for job #{job_id}; released {}",
                Colored(Red, "Lease expired"),
                resources.join(", ")
            );
        }
        WharfEvent::Log {
            level,
            message,
        } => {
            match level {
                LogLevel::Debug => debug!("{message}"),
                LogLevel::Info => info!("{message}"),
                LogLevel::Warning => warn!("{message}"),
                LogLevel::Error => error!("{message}"),
            }
        }
    }
}
