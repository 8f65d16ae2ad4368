pub mod context;
pub mod types;
pub mod utils;

pub mod content;
pub mod jobs;
pub mod ledger;

pub use context::WharfContext;
pub use types::*;
