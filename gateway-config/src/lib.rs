//! Configuration management for the provisioning gateway.
//!
//! Provides environment detection, configuration loading from YAML files,
//! secret handling, and configuration types shared between the gateway
//! binaries and their tests.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
