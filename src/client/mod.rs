//! Simulation API access.
//!
//! `api` is the blocking HTTP client, `types` its wire format, `session` the
//! per-session request sequencing and `task` the embassy task that runs it off
//! the UI thread.

pub mod api;
pub mod session;
pub mod task;
pub mod types;

pub use task::sim_task;
