//! HTTP gateway provisioning managed services as Kubernetes custom resources.
//!
//! Clusters are Gardener Shoots, applications are Argo CD Applications. Both
//! are created from built-in templates, found again through an identity label
//! carrying the caller's id, and deleted through the backend's deletion
//! protocol. Includes bearer authentication, delegated cluster credentials and
//! an OpenAPI description of every route.

pub mod authentication;
pub mod config;
pub mod gateway;
pub mod k8s;
pub mod routes;
pub mod span_builder;
pub mod startup;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
