use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use kube::core::ErrorResponse;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::k8s::{BackendCoordinates, CustomObjectClient, K8sError, ManagedResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomObjectMethod {
    List,
    Create,
    JsonPatch,
    Delete,
}

/// A call received by [`InMemoryCustomObjectClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    List {
        plural: &'static str,
    },
    Create {
        plural: &'static str,
        body: Value,
    },
    JsonPatch {
        plural: &'static str,
        name: String,
        patch: json_patch::Patch,
    },
    Delete {
        plural: &'static str,
        name: String,
    },
}

impl RecordedCall {
    pub fn method(&self) -> CustomObjectMethod {
        match self {
            RecordedCall::List { .. } => CustomObjectMethod::List,
            RecordedCall::Create { .. } => CustomObjectMethod::Create,
            RecordedCall::JsonPatch { .. } => CustomObjectMethod::JsonPatch,
            RecordedCall::Delete { .. } => CustomObjectMethod::Delete,
        }
    }
}

struct StoredObject {
    plural: &'static str,
    body: Value,
}

struct Inner {
    objects: Vec<StoredObject>,
    calls: Vec<RecordedCall>,
    failing_methods: HashSet<CustomObjectMethod>,
}

/// A control plane kept in memory.
///
/// Objects are kept in insertion order, which is also the order `list`
/// returns them in.
#[derive(Clone)]
pub struct InMemoryCustomObjectClient {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCustomObjectClient {
    pub fn new() -> Self {
        let inner = Inner {
            objects: Vec::new(),
            calls: Vec::new(),
            failing_methods: HashSet::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Stores `body` directly, bypassing recording and conflict checks.
    ///
    /// Used to seed foreign or duplicate objects.
    pub async fn insert(&self, coordinates: &BackendCoordinates, body: Value) {
        let mut inner = self.inner.write().await;
        inner.objects.push(StoredObject {
            plural: coordinates.plural,
            body,
        });
    }

    /// Makes every later call of `method` fail with a server error.
    pub async fn fail_on(&self, method: CustomObjectMethod) {
        let mut inner = self.inner.write().await;
        inner.failing_methods.insert(method);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        let inner = self.inner.read().await;
        inner.calls.clone()
    }

    pub async fn call_count(&self, method: CustomObjectMethod) -> usize {
        let inner = self.inner.read().await;
        inner
            .calls
            .iter()
            .filter(|call| call.method() == method)
            .count()
    }

    /// Returns the bodies currently stored for `coordinates`.
    pub async fn objects(&self, coordinates: &BackendCoordinates) -> Vec<Value> {
        let inner = self.inner.read().await;
        inner
            .objects
            .iter()
            .filter(|object| object.plural == coordinates.plural)
            .map(|object| object.body.clone())
            .collect()
    }

    /// Returns the stored body named `name`, if any.
    pub async fn object(&self, coordinates: &BackendCoordinates, name: &str) -> Option<Value> {
        let inner = self.inner.read().await;
        inner
            .objects
            .iter()
            .find(|object| object.plural == coordinates.plural && object_name(&object.body) == Some(name))
            .map(|object| object.body.clone())
    }

    async fn record(&self, call: RecordedCall) -> Result<(), K8sError> {
        let mut inner = self.inner.write().await;
        let method = call.method();
        inner.calls.push(call);

        if inner.failing_methods.contains(&method) {
            return Err(api_error(500, "InternalError", "injected failure"));
        }

        Ok(())
    }
}

impl Default for InMemoryCustomObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomObjectClient for InMemoryCustomObjectClient {
    async fn list(
        &self,
        coordinates: &BackendCoordinates,
    ) -> Result<Vec<ManagedResource>, K8sError> {
        self.record(RecordedCall::List {
            plural: coordinates.plural,
        })
        .await?;

        let inner = self.inner.read().await;
        inner
            .objects
            .iter()
            .filter(|object| object.plural == coordinates.plural)
            .map(|object| managed_resource(&object.body))
            .collect()
    }

    async fn create(&self, coordinates: &BackendCoordinates, body: &Value) -> Result<(), K8sError> {
        self.record(RecordedCall::Create {
            plural: coordinates.plural,
            body: body.clone(),
        })
        .await?;

        let name = object_name(body)
            .ok_or_else(|| K8sError::InvalidObject("object without metadata.name".to_string()))?
            .to_string();

        let mut inner = self.inner.write().await;
        let taken = inner
            .objects
            .iter()
            .any(|object| object.plural == coordinates.plural && object_name(&object.body) == Some(name.as_str()));
        if taken {
            return Err(K8sError::AlreadyExists(name));
        }

        inner.objects.push(StoredObject {
            plural: coordinates.plural,
            body: body.clone(),
        });

        Ok(())
    }

    async fn json_patch(
        &self,
        coordinates: &BackendCoordinates,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<(), K8sError> {
        self.record(RecordedCall::JsonPatch {
            plural: coordinates.plural,
            name: name.to_string(),
            patch: patch.clone(),
        })
        .await?;

        let mut inner = self.inner.write().await;
        let object = inner
            .objects
            .iter_mut()
            .find(|object| object.plural == coordinates.plural && object_name(&object.body) == Some(name))
            .ok_or_else(|| not_found(name))?;

        // Same semantics as the API server: all operations apply or none do.
        json_patch::patch(&mut object.body, patch)
            .map_err(|err| api_error(422, "Invalid", &err.to_string()))?;

        Ok(())
    }

    async fn delete(&self, coordinates: &BackendCoordinates, name: &str) -> Result<(), K8sError> {
        self.record(RecordedCall::Delete {
            plural: coordinates.plural,
            name: name.to_string(),
        })
        .await?;

        let mut inner = self.inner.write().await;
        let position = inner
            .objects
            .iter()
            .position(|object| object.plural == coordinates.plural && object_name(&object.body) == Some(name))
            .ok_or_else(|| not_found(name))?;
        inner.objects.remove(position);

        Ok(())
    }
}

fn object_name(body: &Value) -> Option<&str> {
    body.pointer("/metadata/name").and_then(Value::as_str)
}

fn managed_resource(body: &Value) -> Result<ManagedResource, K8sError> {
    let name = object_name(body)
        .ok_or_else(|| K8sError::InvalidObject("object without metadata.name".to_string()))?;
    let labels = body
        .pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(key, value)| Some((key.clone(), value.as_str()?.to_string())))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    Ok(ManagedResource {
        name: name.to_string(),
        namespace: body
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .map(str::to_string),
        labels,
    })
}

fn not_found(name: &str) -> K8sError {
    api_error(404, "NotFound", &format!("{name} not found"))
}

fn api_error(code: u16, reason: &str, message: &str) -> K8sError {
    K8sError::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}
