mod event;
mod sink;

use std::sync::Arc;

pub use event::*;
pub use sink::*;

/// Identifier of a queued job, as stored in the job table.
pub type JobId = i32;

/// Shared handle to an event sink.
pub type EventSinkHandle = Arc<dyn EventSink>;
