//! The two backend families the gateway manages.
//!
//! A [`BackendProfile`] holds everything static about a family. How each
//! family enriches filtered listings lives behind [`ResourceDetails`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::gateway::deletion::DeletionProtocol;
use crate::gateway::identity::NamingPolicy;
use crate::gateway::templates::{MINIO_APPLICATION_NAME, ResourceTemplate};
use crate::k8s::credentials::CredentialIssuer;
use crate::k8s::{BackendCoordinates, ManagedResource};

/// Gardener Shoots, i.e. provisioned clusters.
pub const SHOOT_COORDINATES: BackendCoordinates = BackendCoordinates {
    group: "core.gardener.cloud",
    version: "v1beta1",
    namespace: "garden-demo",
    kind: "Shoot",
    singular: "shoot",
    plural: "shoots",
};

/// Argo CD Applications, i.e. deployed managed applications.
pub const APPLICATION_COORDINATES: BackendCoordinates = BackendCoordinates {
    group: "argoproj.io",
    version: "v1alpha1",
    namespace: "argocd",
    kind: "Application",
    singular: "application",
    plural: "applications",
};

/// Gardener rejects Shoot names longer than this.
const MAX_SHOOT_NAME_LENGTH: usize = 21;

/// Status reported for resources that exist and need no further checks.
pub const STATUS_OK: &str = "OK";

/// Status reported for clusters whose credential could not be issued yet.
pub const STATUS_PENDING: &str = "PENDING";

/// The single plan offered per backend family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum Plan {
    Cluster(ClusterPlan),
    Application(ApplicationPlan),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPlan {
    pub id: u32,
    pub worker_min: u32,
    pub worker_max: u32,
    pub max_unavailable: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ApplicationPlan {
    pub id: u32,
}

/// Everything static about one backend family.
#[derive(Debug, Clone)]
pub struct BackendProfile {
    /// Human readable name of the resource kind, used in responses.
    pub display_name: &'static str,
    pub coordinates: BackendCoordinates,
    pub naming: NamingPolicy,
    pub template: ResourceTemplate,
    pub deletion: DeletionProtocol,
    pub plan: Plan,
}

impl BackendProfile {
    pub fn cluster() -> Self {
        Self {
            display_name: "Gardener Shoot",
            coordinates: SHOOT_COORDINATES,
            naming: NamingPolicy::ShortIdPrefix {
                prefix: "managed-",
                separator: '-',
                max_length: MAX_SHOOT_NAME_LENGTH,
            },
            template: ResourceTemplate::shoot(&SHOOT_COORDINATES),
            deletion: DeletionProtocol::ConfirmThenDelete,
            plan: Plan::Cluster(ClusterPlan {
                id: 0,
                worker_min: 1,
                worker_max: 2,
                max_unavailable: 0,
            }),
        }
    }

    pub fn application() -> Self {
        Self {
            display_name: "Application",
            coordinates: APPLICATION_COORDINATES,
            naming: NamingPolicy::Fixed(MINIO_APPLICATION_NAME),
            template: ResourceTemplate::minio_application(&APPLICATION_COORDINATES),
            deletion: DeletionProtocol::Direct,
            plan: Plan::Application(ApplicationPlan { id: 0 }),
        }
    }
}

/// Live state reported for one listed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResourceStatus {
    #[schema(example = "OK")]
    pub status: String,
    /// Admin kubeconfig of a provisioned cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
}

/// Fills in the live part of a filtered listing.
#[async_trait]
pub trait ResourceDetails: Send + Sync {
    async fn describe(&self, resource: &ManagedResource) -> ResourceStatus;
}

/// Issues an admin kubeconfig for every listed cluster.
///
/// A failed issue is logged and reported as a pending cluster without a
/// kubeconfig, so it never fails the listing.
pub struct ClusterDetails {
    issuer: Arc<dyn CredentialIssuer>,
    default_namespace: &'static str,
}

impl ClusterDetails {
    pub fn new(issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self {
            issuer,
            default_namespace: SHOOT_COORDINATES.namespace,
        }
    }
}

#[async_trait]
impl ResourceDetails for ClusterDetails {
    async fn describe(&self, resource: &ManagedResource) -> ResourceStatus {
        let namespace = resource
            .namespace
            .as_deref()
            .unwrap_or(self.default_namespace);

        match self.issuer.issue(&resource.name, namespace).await {
            Ok(credential) => ResourceStatus {
                status: STATUS_OK.to_string(),
                kubeconfig: Some(credential.decoded),
            },
            Err(err) => {
                warn!(
                    name = resource.name,
                    namespace,
                    error = %err,
                    "could not issue an admin kubeconfig"
                );

                ResourceStatus {
                    status: STATUS_PENDING.to_string(),
                    kubeconfig: None,
                }
            }
        }
    }
}

/// Applications have no live status call.
pub struct ApplicationDetails;

#[async_trait]
impl ResourceDetails for ApplicationDetails {
    async fn describe(&self, _resource: &ManagedResource) -> ResourceStatus {
        ResourceStatus {
            status: STATUS_OK.to_string(),
            kubeconfig: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::credentials::{ScriptedCredential, ScriptedCredentialIssuer};
    use std::collections::BTreeMap;

    fn shoot(name: &str, namespace: Option<&str>) -> ManagedResource {
        ManagedResource {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            labels: BTreeMap::new(),
        }
    }

    #[test]
    fn plans_serialize_to_camel_case() {
        assert_eq!(
            serde_json::to_value(BackendProfile::cluster().plan).unwrap(),
            serde_json::json!({ "id": 0, "workerMin": 1, "workerMax": 2, "maxUnavailable": 0 })
        );
        assert_eq!(
            serde_json::to_value(BackendProfile::application().plan).unwrap(),
            serde_json::json!({ "id": 0 })
        );
    }

    #[test]
    fn absent_kubeconfig_is_omitted() {
        let status = ResourceStatus {
            status: STATUS_PENDING.to_string(),
            kubeconfig: None,
        };

        insta::assert_json_snapshot!(status, @r#"
        {
          "status": "PENDING"
        }
        "#);
    }

    #[tokio::test]
    async fn issued_credential_marks_cluster_ok() {
        let issuer = ScriptedCredentialIssuer::new();
        issuer
            .script("managed-abc", ScriptedCredential::Issued("kind: Config".to_string()))
            .await;
        let details = ClusterDetails::new(Arc::new(issuer.clone()));

        let status = details.describe(&shoot("managed-abc", Some("garden-demo"))).await;

        assert_eq!(status.status, STATUS_OK);
        assert_eq!(status.kubeconfig.as_deref(), Some("kind: Config"));
        assert_eq!(
            issuer.requests().await,
            vec![("managed-abc".to_string(), "garden-demo".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_credential_marks_cluster_pending() {
        let issuer = ScriptedCredentialIssuer::new();
        issuer
            .script("managed-abc", ScriptedCredential::MissingKubeconfig)
            .await;
        let details = ClusterDetails::new(Arc::new(issuer));

        let status = details.describe(&shoot("managed-abc", None)).await;

        assert_eq!(status.status, STATUS_PENDING);
        assert_eq!(status.kubeconfig, None);
    }

    #[tokio::test]
    async fn missing_namespace_falls_back_to_shoot_namespace() {
        let issuer = ScriptedCredentialIssuer::new();
        let details = ClusterDetails::new(Arc::new(issuer.clone()));

        details.describe(&shoot("managed-abc", None)).await;

        assert_eq!(issuer.requests().await[0].1, "garden-demo");
    }

    #[tokio::test]
    async fn applications_are_always_ok() {
        let status = ApplicationDetails
            .describe(&shoot(MINIO_APPLICATION_NAME, None))
            .await;

        assert_eq!(status.status, STATUS_OK);
        assert_eq!(status.kubeconfig, None);
    }
}
