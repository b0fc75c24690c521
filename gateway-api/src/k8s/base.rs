use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors emitted by the Kubernetes integration.
///
/// Variants wrap lower-level libraries where appropriate to preserve context.
#[derive(Debug, Error)]
pub enum K8sError {
    /// The API server rejected a create because an object with the same name
    /// already exists.
    #[error("A resource named {0} already exists")]
    AlreadyExists(String),
    /// A serialization or deserialization error while building or parsing
    /// Kubernetes resources.
    #[error("An error occurred in serde when dealing with K8s: {0}")]
    Serde(#[from] serde_json::error::Error),
    /// An error returned by the [`kube`] client when talking to the API
    /// server.
    #[error("An error occurred with kube when dealing with K8s: {0}")]
    Kube(#[from] kube::Error),
    /// The API server returned an object missing fields every managed
    /// resource must carry.
    #[error("The API server returned an invalid object: {0}")]
    InvalidObject(String),
}

/// Identifies one custom resource type in the control plane.
///
/// One static value exists per backend family; it never changes for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCoordinates {
    pub group: &'static str,
    pub version: &'static str,
    pub namespace: &'static str,
    pub kind: &'static str,
    pub singular: &'static str,
    pub plural: &'static str,
}

impl BackendCoordinates {
    /// Returns the `group/version` string used as `apiVersion`.
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }
}

/// The slice of a listed custom resource the gateway works with.
///
/// Built once at the client boundary from the raw API object; everything
/// else in the object is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedResource {
    pub name: String,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
}

/// Client interface describing the custom-object operations used by the
/// gateway.
///
/// Every call addresses the namespaced collection named by the given
/// [`BackendCoordinates`]. Implementations issue exactly one request per call
/// and never retry.
#[async_trait]
pub trait CustomObjectClient: Send + Sync {
    /// Lists every object of the given type in its namespace.
    async fn list(&self, coordinates: &BackendCoordinates)
    -> Result<Vec<ManagedResource>, K8sError>;

    /// Creates an object from a complete resource body.
    ///
    /// Returns [`K8sError::AlreadyExists`] when the name is taken.
    async fn create(
        &self,
        coordinates: &BackendCoordinates,
        body: &serde_json::Value,
    ) -> Result<(), K8sError>;

    /// Applies an RFC 6902 JSON-Patch to the named object.
    ///
    /// The patch is applied atomically: when one operation fails, for example
    /// an `add` below a missing parent, the object is left unchanged.
    async fn json_patch(
        &self,
        coordinates: &BackendCoordinates,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<(), K8sError>;

    /// Deletes the named object.
    async fn delete(&self, coordinates: &BackendCoordinates, name: &str) -> Result<(), K8sError>;
}
