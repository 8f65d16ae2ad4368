use error::WharfError;

pub mod artifact;
pub mod content;
pub mod database;
pub mod error;
pub mod tasking;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub type WharfResult<T> = std::result::Result<T, WharfError>;
