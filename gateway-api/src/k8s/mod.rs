//! Kubernetes integration for the provisioning gateway.
//!
//! The gateway never uses typed clients for the resources it manages. All
//! list/create/patch/delete calls go through [`CustomObjectClient`], which the
//! default implementation [`http::HttpK8sClient`] backs with [`kube`]
//! dynamic objects. Tests swap in an in-memory implementation.
//!
//! Delegated credentials are minted through a subresource that the generic
//! client does not model; see [`credentials`].

mod base;
pub mod credentials;
pub mod http;

pub use base::*;
