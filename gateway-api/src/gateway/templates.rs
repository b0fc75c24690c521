//! Default manifests for the resources the gateway provisions.
//!
//! Templates are built once at start-up and shared read-only. Creating a
//! resource clones the template and sets exactly two fields: `metadata.name`
//! and the identity label.

use serde_json::{Map, Value, json};

use crate::gateway::identity::{IDENTITY_LABEL_KEY, ManagedResourceRef};
use crate::k8s::BackendCoordinates;

/// Name given to the storage tenant application.
pub const MINIO_APPLICATION_NAME: &str = "minio-codesphere-demo";

/// An immutable blueprint for one backend's resources.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTemplate {
    body: Value,
}

impl ResourceTemplate {
    /// Wraps an arbitrary resource body.
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// Returns a fresh resource body named and labelled for `reference`.
    pub fn instantiate(&self, reference: &ManagedResourceRef) -> Value {
        let mut body = self.body.clone();

        if !body.is_object() {
            body = Value::Object(Map::new());
        }
        let metadata = body
            .as_object_mut()
            .map(|root| {
                root.entry("metadata")
                    .or_insert_with(|| Value::Object(Map::new()))
            })
            .and_then(Value::as_object_mut);

        if let Some(metadata) = metadata {
            metadata.insert(
                "name".to_string(),
                Value::String(reference.backend_name.clone()),
            );

            let labels = metadata
                .entry("labels")
                .or_insert_with(|| Value::Object(Map::new()));
            if !labels.is_object() {
                *labels = Value::Object(Map::new());
            }
            if let Some(labels) = labels.as_object_mut() {
                labels.insert(
                    IDENTITY_LABEL_KEY.to_string(),
                    Value::String(reference.external_id.clone()),
                );
            }
        }

        body
    }

    /// A GCP-hosted evaluation cluster with one small worker pool.
    pub fn shoot(coordinates: &BackendCoordinates) -> Self {
        Self::new(json!({
            "apiVersion": coordinates.api_version(),
            "kind": coordinates.kind,
            "metadata": {
                "name": "",
                "namespace": coordinates.namespace,
                "labels": {
                    IDENTITY_LABEL_KEY: "",
                },
                // Target of the deletion confirmation patch.
                "annotations": {},
            },
            "spec": {
                "credentialsBindingName": "csa-demo-gcp-secret",
                "cloudProfile": {
                    "kind": "CloudProfile",
                    "name": "gcp",
                },
                "schedulerName": "default-scheduler",
                "addons": {
                    "kubernetesDashboard": {
                        "authenticationMode": "token",
                        "enabled": false,
                    },
                    "nginxIngress": {
                        "enabled": false,
                        "externalTrafficPolicy": "Cluster",
                    },
                },
                "provider": {
                    "controlPlaneConfig": {
                        "apiVersion": "gcp.provider.extensions.gardener.cloud/v1alpha1",
                        "kind": "ControlPlaneConfig",
                        "zone": "europe-west1-b",
                    },
                    "infrastructureConfig": {
                        "apiVersion": "gcp.provider.extensions.gardener.cloud/v1alpha1",
                        "kind": "InfrastructureConfig",
                        "networks": {
                            "workers": "10.250.0.0/16",
                        },
                    },
                    "type": "gcp",
                    "workers": [
                        {
                            "name": "worker-g2e24",
                            "cri": { "name": "containerd" },
                            "minimum": 1,
                            "maximum": 2,
                            "maxSurge": 1,
                            "maxUnavailable": 0,
                            "machine": {
                                "architecture": "amd64",
                                "type": "n1-standard-4",
                                "image": { "name": "ubuntu", "version": "22.0.4" },
                            },
                            "volume": { "type": "pd-standard", "size": "50Gi" },
                        },
                    ],
                    "workersSettings": {
                        "sshAccess": { "enabled": true },
                    },
                },
                "purpose": "evaluation",
                "region": "europe-west1",
                "kubernetes": {
                    "version": "1.32.5",
                },
                "networking": {
                    "type": "calico",
                    "ipFamilies": ["IPv4"],
                    "pods": "100.96.0.0/11",
                    "nodes": "10.250.0.0/16",
                    "services": "100.64.0.0/13",
                },
                "maintenance": {
                    "timeWindow": {
                        "begin": "220000+0100",
                        "end": "230000+0100",
                    },
                    "autoUpdate": {
                        "kubernetesVersion": true,
                        "machineImageVersion": true,
                    },
                },
                "hibernation": { "enabled": false },
            },
        }))
    }

    /// A MinIO tenant deployed from the platform's GitOps repository.
    pub fn minio_application(coordinates: &BackendCoordinates) -> Self {
        Self::new(json!({
            "apiVersion": coordinates.api_version(),
            "kind": coordinates.kind,
            "metadata": {
                "name": MINIO_APPLICATION_NAME,
                "namespace": coordinates.namespace,
                "labels": {
                    IDENTITY_LABEL_KEY: "",
                },
            },
            "spec": {
                "project": "default",
                "source": {
                    "repoURL": "git@gitlab.opencode.de:govtech-deutschland/govtech-platform/gtp-cloud-abstraction.git",
                    "path": "manifests/minio/minio-tenant",
                    "targetRevision": "feature/codesphere",
                    "helm": {
                        "parameters": [
                            {
                                "name": "serverstransport",
                                "value": "minio-tenant-codesphere-insecure-transport@kubernetescrd",
                            },
                            {
                                "name": "ingressHost",
                                "value": "codesphere-minio.dev.medicuscloud.org",
                            },
                            {
                                "name": "s3ingressHost",
                                "value": "s3-codesphere-minio.dev.medicuscloud.org",
                            },
                            { "name": "tenant.pools[0].size", "value": "1Gi" },
                            { "name": "tenant.pools[0].volumesPerServer", "value": "1" },
                            { "name": "tenant.pools[0].name", "value": "pool-codesphere" },
                        ],
                    },
                },
                "destination": {
                    "server": "https://kubernetes.default.svc",
                    "namespace": "minio-tenant-codesphere",
                },
                "syncPolicy": {
                    "automated": {
                        "prune": true,
                        "selfHeal": true,
                    },
                    "syncOptions": ["CreateNamespace=true"],
                },
            },
        }))
    }
}
