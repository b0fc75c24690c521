//! Provisioning of managed services as custom resources.
//!
//! A [`CustomResourceGateway`] maps opaque external ids onto resources of one
//! backend family. The control plane is the only system of record: nothing is
//! cached, every operation starts from a live list.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::gateway::backends::{BackendProfile, Plan, ResourceDetails, ResourceStatus};
use crate::gateway::identity::{IdentifierError, ManagedResourceRef, extract_id};
use crate::k8s::{CustomObjectClient, K8sError, ManagedResource};

pub mod backends;
pub mod deletion;
pub mod identity;
pub mod templates;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("The id is invalid: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("No resource with id {0} was found")]
    NotFound(String),

    #[error("A resource named {0} already exists")]
    BackendConflict(String),

    #[error("The control plane request failed: {0}")]
    BackendUnavailable(#[source] K8sError),
}

impl From<K8sError> for GatewayError {
    fn from(err: K8sError) -> Self {
        match err {
            K8sError::AlreadyExists(name) => GatewayError::BackendConflict(name),
            err => GatewayError::BackendUnavailable(err),
        }
    }
}

/// Configuration of a resource. Every backend offers a single fixed plan, so
/// there is nothing to configure yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResourceConfig {}

/// One entry of a filtered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResourceDetail {
    pub plan: Plan,
    pub config: ResourceConfig,
    pub details: ResourceStatus,
}

/// Result of [`CustomResourceGateway::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ListOutcome {
    /// Every managed id, for an unfiltered listing.
    Ids(Vec<String>),
    /// One single-key map `{ id: detail }` per matched resource.
    Detailed(Vec<BTreeMap<String, ResourceDetail>>),
}

/// Provisions and tears down resources of one backend family.
#[derive(Clone)]
pub struct CustomResourceGateway {
    client: Arc<dyn CustomObjectClient>,
    profile: Arc<BackendProfile>,
    details: Arc<dyn ResourceDetails>,
}

impl CustomResourceGateway {
    pub fn new(
        client: Arc<dyn CustomObjectClient>,
        profile: BackendProfile,
        details: Arc<dyn ResourceDetails>,
    ) -> Self {
        Self {
            client,
            profile: Arc::new(profile),
            details,
        }
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    /// Lists managed resources.
    ///
    /// With an empty `filter` only the ids are returned. Otherwise every
    /// resource whose id is in `filter` is returned with its live details,
    /// which are fetched concurrently.
    pub async fn list(&self, filter: &[String]) -> Result<ListOutcome, GatewayError> {
        let managed = self.managed_resources().await?;

        if filter.is_empty() {
            return Ok(ListOutcome::Ids(
                managed.into_iter().map(|(id, _)| id).collect(),
            ));
        }

        let wanted: HashSet<&str> = filter.iter().map(String::as_str).collect();
        let matched: Vec<(String, ManagedResource)> = managed
            .into_iter()
            .filter(|(id, _)| wanted.contains(id.as_str()))
            .collect();

        let statuses = join_all(
            matched
                .iter()
                .map(|(_, resource)| self.details.describe(resource)),
        )
        .await;

        let entries = matched
            .into_iter()
            .zip(statuses)
            .map(|((id, _), status)| {
                let detail = ResourceDetail {
                    plan: self.profile.plan.clone(),
                    config: ResourceConfig::default(),
                    details: status,
                };

                BTreeMap::from([(id, detail)])
            })
            .collect();

        Ok(ListOutcome::Detailed(entries))
    }

    /// Creates the resource for `external_id` from the backend template and
    /// returns its name.
    pub async fn create(&self, external_id: &str) -> Result<String, GatewayError> {
        let reference = ManagedResourceRef::new(external_id, &self.profile.naming)?;
        let body = self.profile.template.instantiate(&reference);
        let coordinates = &self.profile.coordinates;

        info!(
            id = reference.external_id,
            name = reference.backend_name,
            group = coordinates.group,
            plural = coordinates.plural,
            namespace = coordinates.namespace,
            "creating resource"
        );

        self.client.create(coordinates, &body).await?;

        Ok(reference.backend_name)
    }

    /// Deletes the resource labelled with `external_id` and returns its name.
    pub async fn delete(&self, external_id: &str) -> Result<String, GatewayError> {
        let coordinates = &self.profile.coordinates;
        let resource = self
            .managed_resources()
            .await?
            .into_iter()
            .find(|(id, _)| id == external_id)
            .map(|(_, resource)| resource)
            .ok_or_else(|| GatewayError::NotFound(external_id.to_string()))?;

        info!(
            id = external_id,
            name = resource.name,
            group = coordinates.group,
            plural = coordinates.plural,
            namespace = coordinates.namespace,
            "deleting resource"
        );

        self.profile
            .deletion
            .execute(self.client.as_ref(), coordinates, &resource.name)
            .await?;

        Ok(resource.name)
    }

    /// Acknowledges an update. Every backend offers a single plan, so there is
    /// nothing to change and the control plane is not contacted.
    pub async fn update(&self, external_id: &str) -> Result<(), GatewayError> {
        debug!(
            id = external_id,
            plural = self.profile.coordinates.plural,
            "ignoring update"
        );

        Ok(())
    }

    /// Lists the labelled resources, one per id.
    ///
    /// When several resources carry the same id the last one listed wins,
    /// at the position of the first.
    async fn managed_resources(&self) -> Result<Vec<(String, ManagedResource)>, GatewayError> {
        let resources = self.client.list(&self.profile.coordinates).await?;

        let mut managed: Vec<(String, ManagedResource)> = Vec::with_capacity(resources.len());
        let mut positions: HashMap<String, usize> = HashMap::new();
        for resource in resources {
            let Some(id) = extract_id(&resource).map(str::to_string) else {
                continue;
            };

            match positions.get(&id) {
                Some(&position) => managed[position].1 = resource,
                None => {
                    positions.insert(id.clone(), managed.len());
                    managed.push((id, resource));
                }
            }
        }

        Ok(managed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::backends::{
        APPLICATION_COORDINATES, ApplicationDetails, ClusterDetails, SHOOT_COORDINATES,
        STATUS_OK, STATUS_PENDING,
    };
    use crate::gateway::deletion::deletion_confirmation;
    use crate::gateway::identity::IDENTITY_LABEL_KEY;
    use crate::gateway::templates::MINIO_APPLICATION_NAME;
    use crate::k8s::BackendCoordinates;
    use crate::test_utils::credentials::{
        ScriptedCredential, ScriptedCredentialIssuer, default_kubeconfig,
    };
    use crate::test_utils::custom_objects::{
        CustomObjectMethod, InMemoryCustomObjectClient, RecordedCall,
    };
    use serde_json::{Value, json};

    struct Fixture {
        client: InMemoryCustomObjectClient,
        issuer: ScriptedCredentialIssuer,
        gateway: CustomResourceGateway,
    }

    fn cluster_fixture() -> Fixture {
        let client = InMemoryCustomObjectClient::new();
        let issuer = ScriptedCredentialIssuer::new();
        let gateway = CustomResourceGateway::new(
            Arc::new(client.clone()),
            BackendProfile::cluster(),
            Arc::new(ClusterDetails::new(Arc::new(issuer.clone()))),
        );

        Fixture {
            client,
            issuer,
            gateway,
        }
    }

    fn application_fixture() -> Fixture {
        let client = InMemoryCustomObjectClient::new();
        let gateway = CustomResourceGateway::new(
            Arc::new(client.clone()),
            BackendProfile::application(),
            Arc::new(ApplicationDetails),
        );

        Fixture {
            client,
            issuer: ScriptedCredentialIssuer::new(),
            gateway,
        }
    }

    fn object(coordinates: &BackendCoordinates, name: &str, id: Option<&str>) -> Value {
        let mut body = json!({
            "apiVersion": coordinates.api_version(),
            "kind": coordinates.kind,
            "metadata": { "name": name, "namespace": coordinates.namespace },
        });
        if let Some(id) = id {
            body["metadata"]["labels"] = json!({ IDENTITY_LABEL_KEY: id });
        }

        body
    }

    fn detailed(outcome: ListOutcome) -> Vec<BTreeMap<String, ResourceDetail>> {
        match outcome {
            ListOutcome::Detailed(entries) => entries,
            ListOutcome::Ids(ids) => panic!("expected a detailed listing, got ids {ids:?}"),
        }
    }

    #[tokio::test]
    async fn create_then_filtered_list_returns_one_entry() {
        let fixture = cluster_fixture();

        fixture.gateway.create("abc-123-def").await.unwrap();
        let entries = detailed(
            fixture
                .gateway
                .list(&["abc-123-def".to_string()])
                .await
                .unwrap(),
        );

        assert_eq!(entries.len(), 1);
        let detail = &entries[0]["abc-123-def"];
        assert_eq!(detail.details.status, STATUS_OK);
        assert_eq!(
            detail.details.kubeconfig.as_deref(),
            Some(default_kubeconfig("managed-abc").as_str())
        );
        assert_eq!(detail.plan, BackendProfile::cluster().plan);
    }

    #[tokio::test]
    async fn create_submits_named_and_labelled_template() {
        let fixture = cluster_fixture();

        fixture.gateway.create("abc-123-def").await.unwrap();

        let stored = fixture
            .client
            .object(&SHOOT_COORDINATES, "managed-abc")
            .await
            .unwrap();
        assert_eq!(stored["metadata"]["labels"][IDENTITY_LABEL_KEY], "abc-123-def");
        assert_eq!(stored["spec"]["region"], "europe-west1");
    }

    #[tokio::test]
    async fn create_with_invalid_id_never_reaches_the_backend() {
        let fixture = cluster_fixture();

        let err = fixture.gateway.create("").await.unwrap_err();

        assert!(matches!(err, GatewayError::InvalidIdentifier(IdentifierError::Empty)));
        assert!(fixture.client.calls().await.is_empty());
    }

    #[tokio::test]
    async fn colliding_create_is_a_conflict() {
        let fixture = cluster_fixture();

        fixture.gateway.create("abc-1").await.unwrap();
        let err = fixture.gateway.create("abc-2").await.unwrap_err();

        assert!(matches!(err, GatewayError::BackendConflict(name) if name == "managed-abc"));
        assert_eq!(fixture.client.call_count(CustomObjectMethod::Create).await, 2);
    }

    #[tokio::test]
    async fn failed_create_is_unavailable() {
        let fixture = cluster_fixture();
        fixture.client.fail_on(CustomObjectMethod::Create).await;

        let err = fixture.gateway.create("abc").await.unwrap_err();

        assert!(matches!(err, GatewayError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn unfiltered_list_returns_ids_of_labelled_resources() {
        let fixture = cluster_fixture();
        let client = &fixture.client;
        client
            .insert(&SHOOT_COORDINATES, object(&SHOOT_COORDINATES, "managed-a", Some("a-1")))
            .await;
        client
            .insert(&SHOOT_COORDINATES, object(&SHOOT_COORDINATES, "foreign", None))
            .await;
        client
            .insert(&SHOOT_COORDINATES, object(&SHOOT_COORDINATES, "managed-b", Some("b-1")))
            .await;

        let outcome = fixture.gateway.list(&[]).await.unwrap();

        assert_eq!(
            outcome,
            ListOutcome::Ids(vec!["a-1".to_string(), "b-1".to_string()])
        );
        assert!(fixture.issuer.requests().await.is_empty());
    }

    #[tokio::test]
    async fn filter_matching_nothing_is_empty() {
        let fixture = cluster_fixture();
        fixture.gateway.create("abc").await.unwrap();

        let outcome = fixture.gateway.list(&["xyz".to_string()]).await.unwrap();

        assert_eq!(outcome, ListOutcome::Detailed(vec![]));
    }

    #[tokio::test]
    async fn duplicate_ids_keep_the_last_resource() {
        let fixture = cluster_fixture();
        let client = &fixture.client;
        client
            .insert(&SHOOT_COORDINATES, object(&SHOOT_COORDINATES, "managed-old", Some("dup")))
            .await;
        client
            .insert(&SHOOT_COORDINATES, object(&SHOOT_COORDINATES, "managed-x", Some("x")))
            .await;
        client
            .insert(&SHOOT_COORDINATES, object(&SHOOT_COORDINATES, "managed-new", Some("dup")))
            .await;

        let ids = fixture.gateway.list(&[]).await.unwrap();
        fixture.gateway.list(&["dup".to_string()]).await.unwrap();

        assert_eq!(ids, ListOutcome::Ids(vec!["dup".to_string(), "x".to_string()]));
        assert_eq!(
            fixture.issuer.requests().await,
            vec![("managed-new".to_string(), "garden-demo".to_string())]
        );
    }

    #[tokio::test]
    async fn credential_failure_keeps_the_entry() {
        let fixture = cluster_fixture();
        fixture.gateway.create("a-1").await.unwrap();
        fixture.gateway.create("b-1").await.unwrap();
        fixture
            .issuer
            .script("managed-a", ScriptedCredential::MissingKubeconfig)
            .await;

        let entries = detailed(
            fixture
                .gateway
                .list(&["a-1".to_string(), "b-1".to_string()])
                .await
                .unwrap(),
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["a-1"].details.status, STATUS_PENDING);
        assert_eq!(entries[0]["a-1"].details.kubeconfig, None);
        assert_eq!(entries[1]["b-1"].details.status, STATUS_OK);
        assert!(entries[1]["b-1"].details.kubeconfig.is_some());
    }

    #[tokio::test]
    async fn failed_list_is_unavailable() {
        let fixture = cluster_fixture();
        fixture.client.fail_on(CustomObjectMethod::List).await;

        let err = fixture.gateway.list(&[]).await.unwrap_err();

        assert!(matches!(err, GatewayError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn cluster_delete_annotates_then_deletes() {
        let fixture = cluster_fixture();
        fixture.gateway.create("abc-123").await.unwrap();

        fixture.gateway.delete("abc-123").await.unwrap();

        let calls = fixture.client.calls().await;
        let mutations: Vec<_> = calls
            .iter()
            .filter(|call| call.method() != CustomObjectMethod::List)
            .skip(1)
            .collect();
        assert!(matches!(
            mutations.as_slice(),
            [
                RecordedCall::JsonPatch { name: patched, patch, .. },
                RecordedCall::Delete { name: deleted, .. },
            ] if patched == "managed-abc"
                && deleted == "managed-abc"
                && *patch == deletion_confirmation()
        ));
        assert_eq!(
            fixture.gateway.list(&["abc-123".to_string()]).await.unwrap(),
            ListOutcome::Detailed(vec![])
        );
    }

    #[tokio::test]
    async fn failed_annotation_prevents_delete() {
        let fixture = cluster_fixture();
        fixture.gateway.create("abc").await.unwrap();
        fixture.client.fail_on(CustomObjectMethod::JsonPatch).await;

        let err = fixture.gateway.delete("abc").await.unwrap_err();

        assert!(matches!(err, GatewayError::BackendUnavailable(_)));
        assert_eq!(fixture.client.call_count(CustomObjectMethod::JsonPatch).await, 1);
        assert_eq!(fixture.client.call_count(CustomObjectMethod::Delete).await, 0);
        assert!(
            fixture
                .client
                .object(&SHOOT_COORDINATES, "managed-abc")
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn failed_delete_leaves_resource_annotated() {
        let fixture = cluster_fixture();
        fixture.gateway.create("abc").await.unwrap();
        fixture.client.fail_on(CustomObjectMethod::Delete).await;

        let err = fixture.gateway.delete("abc").await.unwrap_err();

        assert!(matches!(err, GatewayError::BackendUnavailable(_)));
        let stored = fixture
            .client
            .object(&SHOOT_COORDINATES, "managed-abc")
            .await
            .unwrap();
        assert_eq!(
            stored["metadata"]["annotations"]["confirmation.gardener.cloud/deletion"],
            "true"
        );
    }

    #[tokio::test]
    async fn deleting_unknown_id_is_not_found() {
        let fixture = cluster_fixture();
        fixture
            .client
            .insert(&SHOOT_COORDINATES, object(&SHOOT_COORDINATES, "managed-a", Some("a")))
            .await;

        let err = fixture.gateway.delete("b").await.unwrap_err();

        assert!(matches!(err, GatewayError::NotFound(id) if id == "b"));
        assert_eq!(fixture.client.call_count(CustomObjectMethod::JsonPatch).await, 0);
        assert_eq!(fixture.client.call_count(CustomObjectMethod::Delete).await, 0);
    }

    #[tokio::test]
    async fn application_delete_is_direct() {
        let fixture = application_fixture();
        fixture.gateway.create("tenant-1").await.unwrap();

        fixture.gateway.delete("tenant-1").await.unwrap();

        assert_eq!(fixture.client.call_count(CustomObjectMethod::JsonPatch).await, 0);
        assert_eq!(fixture.client.call_count(CustomObjectMethod::Delete).await, 1);
        assert!(fixture.client.objects(&APPLICATION_COORDINATES).await.is_empty());
    }

    #[tokio::test]
    async fn application_details_are_static() {
        let fixture = application_fixture();
        fixture.gateway.create("tenant-1").await.unwrap();

        let entries = detailed(
            fixture
                .gateway
                .list(&["tenant-1".to_string()])
                .await
                .unwrap(),
        );

        assert_eq!(
            serde_json::to_value(&entries).unwrap(),
            json!([{ "tenant-1": { "plan": { "id": 0 }, "config": {}, "details": { "status": "OK" } } }])
        );
    }

    #[tokio::test]
    async fn second_application_conflicts_on_fixed_name() {
        let fixture = application_fixture();
        fixture.gateway.create("tenant-1").await.unwrap();

        let err = fixture.gateway.create("tenant-2").await.unwrap_err();

        assert!(
            matches!(err, GatewayError::BackendConflict(name) if name == MINIO_APPLICATION_NAME)
        );
    }

    #[tokio::test]
    async fn update_never_contacts_the_backend() {
        let fixture = cluster_fixture();

        fixture.gateway.update("abc").await.unwrap();

        assert!(fixture.client.calls().await.is_empty());
    }
}
