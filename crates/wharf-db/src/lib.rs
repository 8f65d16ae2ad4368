//! Persistence for wharf: the SQLite schema, embedded migrations, row models, and
//! repository structs for content, artifacts, the repository ledger and the job queue.

pub mod connection;
pub mod error;
pub mod migration;
pub mod models;
pub mod repository;
pub mod schema;

pub use error::{DbError, Result};
