use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use tokio::sync::RwLock;

use crate::k8s::credentials::{CredentialError, CredentialIssuer, DelegatedCredential};

/// What [`ScriptedCredentialIssuer`] answers for one resource.
#[derive(Debug, Clone)]
pub enum ScriptedCredential {
    Issued(String),
    UnexpectedStatus(u16),
    MissingKubeconfig,
}

/// A credential issued for a resource without a script entry.
pub fn default_kubeconfig(resource_name: &str) -> String {
    format!("apiVersion: v1\nkind: Config\ncurrent-context: {resource_name}\n")
}

struct Inner {
    script: HashMap<String, ScriptedCredential>,
    requests: Vec<(String, String)>,
}

/// A [`CredentialIssuer`] that answers from a script.
///
/// Resources without an entry get [`default_kubeconfig`].
#[derive(Clone)]
pub struct ScriptedCredentialIssuer {
    inner: Arc<RwLock<Inner>>,
}

impl ScriptedCredentialIssuer {
    pub fn new() -> Self {
        let inner = Inner {
            script: HashMap::new(),
            requests: Vec::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    pub async fn script(&self, resource_name: &str, answer: ScriptedCredential) {
        let mut inner = self.inner.write().await;
        inner.script.insert(resource_name.to_string(), answer);
    }

    /// Returns every `(resource_name, namespace)` pair requested so far.
    pub async fn requests(&self) -> Vec<(String, String)> {
        let inner = self.inner.read().await;
        inner.requests.clone()
    }
}

impl Default for ScriptedCredentialIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialIssuer for ScriptedCredentialIssuer {
    async fn issue(
        &self,
        resource_name: &str,
        namespace: &str,
    ) -> Result<DelegatedCredential, CredentialError> {
        let answer = {
            let mut inner = self.inner.write().await;
            inner
                .requests
                .push((resource_name.to_string(), namespace.to_string()));
            inner.script.get(resource_name).cloned()
        };

        match answer.unwrap_or_else(|| ScriptedCredential::Issued(default_kubeconfig(resource_name)))
        {
            ScriptedCredential::Issued(decoded) => Ok(DelegatedCredential {
                raw: BASE64_STANDARD.encode(&decoded),
                decoded,
            }),
            ScriptedCredential::UnexpectedStatus(status) => {
                Err(CredentialError::UnexpectedStatus { status })
            }
            ScriptedCredential::MissingKubeconfig => Err(CredentialError::MissingKubeconfig),
        }
    }
}
