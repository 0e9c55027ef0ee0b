//! `taskdash` -- task dashboard client library.
//!
//! The [`engine`] owns the server-confirmed task collection and publishes
//! filtered snapshots; [`gateway`] talks to the task service.

pub mod config;
pub mod engine;
pub mod gateway;
pub mod lifecycle;
pub mod tasks;
