//! Two-phase delete required by the cluster provisioner.
//!
//! Gardener ignores deletes of Shoots that do not carry the deletion
//! confirmation annotation. The protocol is modeled as a typestate: a
//! [`ConfirmedDeletion`] can only be obtained from a successful
//! [`UnconfirmedDeletion::annotate`], and only a confirmed deletion can issue
//! the delete call.
//!
//! The confirmation is a JSON-Patch `add` below `/metadata/annotations`, so
//! the annotation map must already exist. Gardener's admission sets
//! `gardener.cloud/created-by` on every Shoot and the Shoot template carries
//! an annotation map of its own. A Shoot without annotations fails the patch
//! and is never deleted.

use json_patch::{AddOperation, Patch, PatchOperation};
use jsonptr::PointerBuf;
use serde_json::Value;
use tracing::info;

use crate::k8s::{BackendCoordinates, CustomObjectClient, K8sError};

/// Annotation Gardener checks before deleting a Shoot.
pub const DELETION_CONFIRMATION_ANNOTATION: &str = "confirmation.gardener.cloud/deletion";

/// How a backend deletes one of its resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionProtocol {
    /// A single delete call.
    Direct,
    /// Annotate for confirmation first, delete only once that succeeded.
    ConfirmThenDelete,
}

/// Returns the patch marking a resource as confirmed for deletion.
pub fn deletion_confirmation() -> Patch {
    Patch(vec![PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(["metadata", "annotations", DELETION_CONFIRMATION_ANNOTATION]),
        value: Value::String("true".to_string()),
    })])
}

/// An existing resource that has not been confirmed for deletion.
pub struct UnconfirmedDeletion<'a> {
    client: &'a dyn CustomObjectClient,
    coordinates: &'a BackendCoordinates,
    name: &'a str,
}

/// A resource carrying the deletion confirmation annotation.
///
/// Annotating again is harmless, so a failed delete can be retried from a
/// fresh [`UnconfirmedDeletion`].
pub struct ConfirmedDeletion<'a> {
    client: &'a dyn CustomObjectClient,
    coordinates: &'a BackendCoordinates,
    name: &'a str,
}

impl<'a> UnconfirmedDeletion<'a> {
    pub fn new(
        client: &'a dyn CustomObjectClient,
        coordinates: &'a BackendCoordinates,
        name: &'a str,
    ) -> Self {
        Self {
            client,
            coordinates,
            name,
        }
    }

    /// Applies the confirmation annotation.
    ///
    /// On error the resource stays unconfirmed and no delete is possible.
    pub async fn annotate(self) -> Result<ConfirmedDeletion<'a>, K8sError> {
        self.client
            .json_patch(self.coordinates, self.name, &deletion_confirmation())
            .await?;

        info!(
            name = self.name,
            group = self.coordinates.group,
            plural = self.coordinates.plural,
            namespace = self.coordinates.namespace,
            "resource confirmed for deletion"
        );

        Ok(ConfirmedDeletion {
            client: self.client,
            coordinates: self.coordinates,
            name: self.name,
        })
    }
}

impl ConfirmedDeletion<'_> {
    /// Issues the delete call.
    pub async fn delete(self) -> Result<(), K8sError> {
        self.client.delete(self.coordinates, self.name).await
    }
}

impl DeletionProtocol {
    /// Deletes the resource `name`, annotating it first when required.
    pub async fn execute(
        &self,
        client: &dyn CustomObjectClient,
        coordinates: &BackendCoordinates,
        name: &str,
    ) -> Result<(), K8sError> {
        match self {
            DeletionProtocol::Direct => client.delete(coordinates, name).await,
            DeletionProtocol::ConfirmThenDelete => {
                UnconfirmedDeletion::new(client, coordinates, name)
                    .annotate()
                    .await?
                    .delete()
                    .await
            }
        }
    }
}
