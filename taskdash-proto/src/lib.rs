//! Shared wire definitions for the taskdash task service contract.

pub mod codec;
pub mod task;
