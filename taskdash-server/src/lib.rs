//! `taskdash` reference task service library.
//!
//! Exposes the HTTP API and its in-memory task store for use in tests and
//! embedding. Tasks live only as long as the process.

pub mod api;
pub mod config;
pub mod store;
