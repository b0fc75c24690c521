//! Logging and metrics set-up shared by the gateway binaries and tests.

pub mod metrics;
pub mod tracing;
