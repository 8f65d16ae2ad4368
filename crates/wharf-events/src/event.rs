use crate::JobId;

/// All event types emitted by wharf operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WharfEvent {
    /// An upload moved to the next ingestion stage.
    Content {
        filename: String,
        stage: ContentStage,
    },
    /// A content unit was created.
    ContentCreated {
        content_id: i32,
        name: String,
        version: String,
        packagetype: String,
        filename: String,
    },
    /// An upload was rejected; nothing was persisted.
    ContentRejected {
        filename: String,
        reason: String,
    },
    /// A job was accepted and queued behind its resources.
    JobQueued {
        job_id: JobId,
        operation: String,
        resources: Vec<String>,
    },
    /// A worker acquired the job's reservations and started running it.
    JobStarted {
        job_id: JobId,
        operation: String,
        worker: String,
    },
    /// A worker renewed its reservation lease.
    LeaseRenewed {
        job_id: JobId,
        worker: String,
    },
    /// A job reached a terminal state.
    JobFinished {
        job_id: JobId,
        operation: String,
        outcome: JobOutcome,
    },
    /// A reservation lease expired and the orphaned job was failed.
    LeaseExpired {
        job_id: JobId,
        resources: Vec<String>,
    },
    /// Generic log message.
    Log {
        level: LogLevel,
        message: String,
    },
}

/// Stages of the content ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentStage {
    Detecting,
    Extracting { packagetype: String },
    Normalizing,
    Persisting,
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed { error: String },
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}
