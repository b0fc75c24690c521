use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Lifetime requested for issued admin kubeconfigs when none is configured.
const DEFAULT_CREDENTIAL_EXPIRATION_SECONDS: u64 = 600;

/// Shortest admin kubeconfig lifetime the cluster provisioner accepts.
const MIN_CREDENTIAL_EXPIRATION_SECONDS: u64 = 600;

/// Longest admin kubeconfig lifetime the cluster provisioner accepts.
const MAX_CREDENTIAL_EXPIRATION_SECONDS: u64 = 86_400;

/// Settings for talking to the control plane that stores the managed resources.
///
/// Connection material (server, certificates, tokens) is never configured here;
/// it is always inferred from the ambient kubeconfig or in-cluster service account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// Validity window, in seconds, requested for every delegated credential.
    #[serde(default = "default_credential_expiration_seconds")]
    pub credential_expiration_seconds: u64,
}

impl KubernetesConfig {
    /// Checks that the configured values are accepted by the backend.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let actual = self.credential_expiration_seconds;
        if !(MIN_CREDENTIAL_EXPIRATION_SECONDS..=MAX_CREDENTIAL_EXPIRATION_SECONDS)
            .contains(&actual)
        {
            return Err(ValidationError::CredentialExpirationOutOfRange {
                min: MIN_CREDENTIAL_EXPIRATION_SECONDS,
                max: MAX_CREDENTIAL_EXPIRATION_SECONDS,
                actual,
            });
        }

        Ok(())
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            credential_expiration_seconds: DEFAULT_CREDENTIAL_EXPIRATION_SECONDS,
        }
    }
}

fn default_credential_expiration_seconds() -> u64 {
    DEFAULT_CREDENTIAL_EXPIRATION_SECONDS
}
