pub mod artifact;
pub mod content;
pub mod jobs;
pub mod ledger;
