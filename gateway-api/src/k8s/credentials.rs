use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use kube::Config;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::k8s::BackendCoordinates;

/// Subresource of a Shoot that mints admin kubeconfigs.
const ADMIN_KUBECONFIG_SUBRESOURCE: &str = "adminkubeconfig";

/// `apiVersion` of the request object accepted by the subresource.
const ADMIN_KUBECONFIG_REQUEST_API_VERSION: &str = "authentication.gardener.cloud/v1alpha1";

/// `kind` of the request object accepted by the subresource.
const ADMIN_KUBECONFIG_REQUEST_KIND: &str = "AdminKubeconfigRequest";

/// Reasons a delegated credential could not be obtained.
///
/// None of these are fatal to a listing: callers report the credential as
/// absent and carry on with the remaining resources.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("the credential request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("the credential endpoint answered with status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("the credential response is not valid json: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("the credential response has no status.kubeconfig field")]
    MissingKubeconfig,

    #[error("the issued kubeconfig is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("the issued kubeconfig is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("the bearer token could not be read from {path}: {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("the client certificate material is unusable: {0}")]
    ClientIdentity(String),
}

/// A short-lived admin kubeconfig for one cluster.
///
/// Obtained per request and never cached. The expiry is enforced by the
/// issuing control plane, not by the gateway.
#[derive(Clone)]
pub struct DelegatedCredential {
    /// The base64 payload exactly as returned by the control plane.
    pub raw: String,
    /// The decoded kubeconfig document.
    pub decoded: String,
}

impl fmt::Debug for DelegatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedCredential")
            .field("raw", &"[REDACTED]")
            .field("decoded", &"[REDACTED]")
            .finish()
    }
}

/// Issues delegated credentials for provisioned clusters.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Requests a fresh credential for the cluster resource `resource_name`
    /// living in `namespace`.
    async fn issue(
        &self,
        resource_name: &str,
        namespace: &str,
    ) -> Result<DelegatedCredential, CredentialError>;
}

/// How the bearer token of the active kube context is obtained.
enum BearerToken {
    Inline(SecretString),
    /// Re-read on every request; projected service account tokens rotate.
    File(PathBuf),
}

impl BearerToken {
    async fn resolve(&self) -> Result<SecretString, CredentialError> {
        match self {
            BearerToken::Inline(token) => Ok(token.clone()),
            BearerToken::File(path) => {
                let token = tokio::fs::read_to_string(path).await.map_err(|source| {
                    CredentialError::TokenFile {
                        path: path.display().to_string(),
                        source,
                    }
                })?;

                Ok(SecretString::from(token.trim().to_string()))
            }
        }
    }
}

/// Calls the `adminkubeconfig` subresource of a Shoot directly.
///
/// The generic custom-object client has no notion of this subresource, so the
/// issuer keeps its own HTTP client. It is built from the same kubeconfig as
/// the generic client: the cluster CA bundle, the client certificate and key
/// for mutual TLS, and the bearer token when the context is token based.
pub struct AdminKubeconfigIssuer {
    http: reqwest::Client,
    server: String,
    coordinates: BackendCoordinates,
    token: Option<BearerToken>,
    expiration_seconds: u64,
}

impl AdminKubeconfigIssuer {
    /// Builds an issuer for clusters of the given resource type.
    pub fn try_from_config(
        config: &Config,
        coordinates: BackendCoordinates,
        expiration_seconds: u64,
    ) -> Result<Self, CredentialError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        for der in config.root_cert.iter().flatten() {
            builder = builder.add_root_certificate(reqwest::Certificate::from_der(der)?);
        }

        if let Some(identity_pem) = client_identity_pem(config)? {
            builder = builder.identity(reqwest::Identity::from_pem(&identity_pem)?);
        }

        let auth_info = &config.auth_info;
        let token = match (&auth_info.token, &auth_info.token_file) {
            (Some(token), _) => Some(BearerToken::Inline(token.clone())),
            (None, Some(path)) => Some(BearerToken::File(PathBuf::from(path))),
            (None, None) => None,
        };

        Ok(Self {
            http: builder.build()?,
            server: config.cluster_url.to_string().trim_end_matches('/').to_string(),
            coordinates,
            token,
            expiration_seconds,
        })
    }

    fn url(&self, resource_name: &str, namespace: &str) -> String {
        format!(
            "{}/apis/{}/{}/namespaces/{namespace}/{}/{resource_name}/{ADMIN_KUBECONFIG_SUBRESOURCE}",
            self.server, self.coordinates.group, self.coordinates.version, self.coordinates.plural,
        )
    }
}

#[async_trait]
impl CredentialIssuer for AdminKubeconfigIssuer {
    async fn issue(
        &self,
        resource_name: &str,
        namespace: &str,
    ) -> Result<DelegatedCredential, CredentialError> {
        let body = admin_kubeconfig_request(self.expiration_seconds);

        let mut request = self
            .http
            .post(self.url(resource_name, namespace))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.resolve().await?.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let credential = decode_admin_kubeconfig_response(&bytes)?;
        debug!(
            resource_name,
            namespace, "issued admin kubeconfig for cluster"
        );

        Ok(credential)
    }
}

/// Builds the request body asking for a credential valid for `expiration_seconds`.
fn admin_kubeconfig_request(expiration_seconds: u64) -> serde_json::Value {
    json!({
        "apiVersion": ADMIN_KUBECONFIG_REQUEST_API_VERSION,
        "kind": ADMIN_KUBECONFIG_REQUEST_KIND,
        "spec": {
            "expirationSeconds": expiration_seconds,
        },
    })
}

#[derive(Deserialize)]
struct AdminKubeconfigResponse {
    status: Option<AdminKubeconfigStatus>,
}

#[derive(Deserialize)]
struct AdminKubeconfigStatus {
    kubeconfig: Option<String>,
}

/// Extracts and decodes `status.kubeconfig` from a subresource response.
pub fn decode_admin_kubeconfig_response(
    body: &[u8],
) -> Result<DelegatedCredential, CredentialError> {
    let response: AdminKubeconfigResponse = serde_json::from_slice(body)?;
    let raw = response
        .status
        .and_then(|status| status.kubeconfig)
        .ok_or(CredentialError::MissingKubeconfig)?;

    let decoded = String::from_utf8(BASE64_STANDARD.decode(&raw)?)?;

    Ok(DelegatedCredential { raw, decoded })
}

/// Concatenates client certificate and key into the single PEM buffer
/// [`reqwest::Identity::from_pem`] expects.
///
/// Returns `None` when the context does not authenticate with a client
/// certificate.
fn client_identity_pem(config: &Config) -> Result<Option<Vec<u8>>, CredentialError> {
    let auth_info = &config.auth_info;

    let certificate = match (
        &auth_info.client_certificate_data,
        &auth_info.client_certificate,
    ) {
        (Some(data), _) => Some(decode_pem_data(data, "client-certificate-data")?),
        (None, Some(path)) => Some(read_pem_file(path)?),
        (None, None) => None,
    };

    let key = match (&auth_info.client_key_data, &auth_info.client_key) {
        (Some(data), _) => Some(decode_pem_data(data.expose_secret(), "client-key-data")?),
        (None, Some(path)) => Some(read_pem_file(path)?),
        (None, None) => None,
    };

    match (certificate, key) {
        (Some(mut certificate), Some(key)) => {
            if !certificate.ends_with(b"\n") {
                certificate.push(b'\n');
            }
            certificate.extend_from_slice(&key);
            Ok(Some(certificate))
        }
        (None, None) => Ok(None),
        _ => Err(CredentialError::ClientIdentity(
            "a client certificate and a client key must be configured together".to_string(),
        )),
    }
}

fn decode_pem_data(data: &str, field: &str) -> Result<Vec<u8>, CredentialError> {
    BASE64_STANDARD
        .decode(data.trim())
        .map_err(|e| CredentialError::ClientIdentity(format!("{field} is not valid base64: {e}")))
}

fn read_pem_file(path: &str) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path)
        .map_err(|e| CredentialError::ClientIdentity(format!("failed to read {path}: {e}")))
}
