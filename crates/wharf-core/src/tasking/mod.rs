//! Reservation-scoped job dispatch and execution.
//!
//! - [`ReservationDispatcher`] validates sync and publish requests and queues them with the
//!   set of resources they mutate, returning a [`JobHandle`] without waiting.
//! - [`JobRuntime`] claims runnable jobs (FIFO among jobs whose resource sets overlap),
//!   holds leased reservations while they run, and records outcomes.
//! - [`WorkerPool`] drives the runtime from tokio tasks, running each [`JobHandler`] on the
//!   blocking pool while renewing its lease.

pub mod dispatcher;
pub mod handlers;
pub mod payload;
pub mod resource;
pub mod runtime;
pub mod worker;

pub use dispatcher::{JobHandle, ReservationDispatcher};
pub use handlers::{
    HandlerRegistry, JobContext, JobHandler, JobOutcomeDetail, NoopFetcher, PublishHandler,
    RemoteFetcher, SyncHandler,
};
pub use payload::{JobPayload, Operation, PublishPayload, PublishRequest, SyncRequest, VersionRef};
pub use resource::ResourceId;
pub use runtime::{ClaimedJob, JobRuntime, JobStatus};
pub use wharf_db::models::jobs::JobState;
pub use worker::{WorkerOptions, WorkerPool};
