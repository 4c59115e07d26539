//! Process level glue: options, running the main script, reporting
pub mod error;
pub mod launch;
pub mod options;
pub mod statistics;
