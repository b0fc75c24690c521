use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The requested credential lifetime is outside the range the cluster
    /// provisioner accepts.
    #[error(
        "`credential_expiration_seconds` must be between {min} and {max}, but it is {actual}"
    )]
    CredentialExpirationOutOfRange { min: u64, max: u64, actual: u64 },
}
