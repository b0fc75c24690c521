use serde::{Deserialize, Serialize};

use crate::SerializableSecretString;

/// Sentry error tracking configuration.
///
/// Contains the DSN required to initialize Sentry for error tracking and
/// performance monitoring of the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Sentry DSN (Data Source Name) for error reporting and monitoring.
    pub dsn: SerializableSecretString,
}
