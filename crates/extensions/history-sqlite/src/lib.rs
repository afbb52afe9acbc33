//! SQLite execution history for CronHands.
//!
//! Keeps execution records in a single SQLite table so job state survives
//! a restart of the runner.

mod schema;
mod sink;

pub use sink::SqliteHistorySink;
