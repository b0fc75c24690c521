//! In-memory doubles for the control plane.
//!
//! [`custom_objects::InMemoryCustomObjectClient`] stores resource bodies per
//! collection and records every call it receives, including calls that were
//! made to fail. [`credentials::ScriptedCredentialIssuer`] answers credential
//! requests from a per-resource script.
pub mod credentials;
pub mod custom_objects;
