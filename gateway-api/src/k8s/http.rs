use async_trait::async_trait;
use kube::api::{
    Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use tracing::debug;

use crate::k8s::{BackendCoordinates, CustomObjectClient, K8sError, ManagedResource};

/// HTTP status the API server answers with when a name is already taken.
const CONFLICT_STATUS_CODE: u16 = 409;

/// [`CustomObjectClient`] backed by [`kube`] dynamic objects.
///
/// No typed client exists for the managed resource kinds, so every call goes
/// through [`Api<DynamicObject>`] with an [`ApiResource`] built from the
/// backend coordinates.
#[derive(Clone)]
pub struct HttpK8sClient {
    client: Client,
}

impl HttpK8sClient {
    /// Builds a client from an already inferred kubeconfig.
    ///
    /// The same [`Config`] is used to build the credential issuer, so both
    /// talk to the same server with the same identity.
    pub fn try_from_config(config: Config) -> Result<Self, K8sError> {
        let client = Client::try_from(config)?;

        Ok(Self { client })
    }

    fn api(&self, coordinates: &BackendCoordinates) -> Api<DynamicObject> {
        let api_resource = ApiResource {
            group: coordinates.group.to_string(),
            version: coordinates.version.to_string(),
            api_version: coordinates.api_version(),
            kind: coordinates.kind.to_string(),
            plural: coordinates.plural.to_string(),
        };

        Api::namespaced_with(self.client.clone(), coordinates.namespace, &api_resource)
    }
}

#[async_trait]
impl CustomObjectClient for HttpK8sClient {
    async fn list(
        &self,
        coordinates: &BackendCoordinates,
    ) -> Result<Vec<ManagedResource>, K8sError> {
        let objects = self.api(coordinates).list(&ListParams::default()).await?;
        debug!(
            plural = coordinates.plural,
            namespace = coordinates.namespace,
            count = objects.items.len(),
            "listed custom objects"
        );

        objects.items.into_iter().map(managed_resource_from).collect()
    }

    async fn create(
        &self,
        coordinates: &BackendCoordinates,
        body: &serde_json::Value,
    ) -> Result<(), K8sError> {
        let object: DynamicObject = serde_json::from_value(body.clone())?;
        let name = object.metadata.name.clone().unwrap_or_default();

        match self
            .api(coordinates)
            .create(&PostParams::default(), &object)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == CONFLICT_STATUS_CODE => {
                Err(K8sError::AlreadyExists(name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn json_patch(
        &self,
        coordinates: &BackendCoordinates,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<(), K8sError> {
        self.api(coordinates)
            .patch(name, &PatchParams::default(), &Patch::<()>::Json(patch.clone()))
            .await?;

        Ok(())
    }

    async fn delete(&self, coordinates: &BackendCoordinates, name: &str) -> Result<(), K8sError> {
        self.api(coordinates)
            .delete(name, &DeleteParams::default())
            .await?;

        Ok(())
    }
}

/// Validates a raw API object into a [`ManagedResource`].
///
/// A missing name means the object cannot be addressed later and is treated
/// as an invalid response. Missing labels are fine: the resource is simply
/// not managed by the gateway.
fn managed_resource_from(object: DynamicObject) -> Result<ManagedResource, K8sError> {
    let metadata = object.metadata;
    let name = metadata
        .name
        .ok_or_else(|| K8sError::InvalidObject("object without metadata.name".to_string()))?;

    Ok(ManagedResource {
        name,
        namespace: metadata.namespace,
        labels: metadata.labels.unwrap_or_default(),
    })
}
