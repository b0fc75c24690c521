//! Mapping between opaque external ids and backend resources.
//!
//! Every resource the gateway creates carries [`IDENTITY_LABEL_KEY`] with the
//! caller's id as value. The label is the only way resources are found again;
//! backend names are always recomputed or looked up live.

use thiserror::Error;

use crate::k8s::ManagedResource;

/// Label key holding the external id on every managed resource.
pub const IDENTITY_LABEL_KEY: &str = "managed-service.codesphere.com/id";

/// Longest value Kubernetes accepts for a label.
const MAX_LABEL_VALUE_LENGTH: usize = 63;

/// Reasons an external id cannot be mapped onto a backend resource.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("the id must not be empty")]
    Empty,

    #[error("the id is {length} characters long, at most {MAX_LABEL_VALUE_LENGTH} are allowed")]
    TooLong { length: usize },

    #[error(
        "the id must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character"
    )]
    InvalidCharacters,

    #[error("the id maps to the resource name {name:?}, which is not a valid name: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

/// How a backend turns an external id into a resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingPolicy {
    /// `{prefix}{segment}`, where `segment` is the part of the id before the
    /// first `separator`.
    ///
    /// Ids sharing their first segment map to the same name. The backend
    /// rejects the second create, so the collision surfaces as a conflict
    /// instead of being resolved here.
    ShortIdPrefix {
        prefix: &'static str,
        separator: char,
        max_length: usize,
    },
    /// Every resource gets the same name, so at most one exists at a time.
    Fixed(&'static str),
}

impl NamingPolicy {
    /// Derives the backend resource name for `external_id`.
    ///
    /// Pure: the same id always yields the same name.
    pub fn derive_name(&self, external_id: &str) -> Result<String, IdentifierError> {
        if external_id.is_empty() {
            return Err(IdentifierError::Empty);
        }

        match self {
            NamingPolicy::ShortIdPrefix {
                prefix,
                separator,
                max_length,
            } => {
                let short_id = external_id
                    .split(*separator)
                    .next()
                    .unwrap_or(external_id);
                let name = format!("{prefix}{short_id}");
                validate_dns_label(&name, *max_length)?;

                Ok(name)
            }
            NamingPolicy::Fixed(name) => Ok((*name).to_string()),
        }
    }
}

/// An external id together with the backend name derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedResourceRef {
    pub external_id: String,
    pub backend_name: String,
}

impl ManagedResourceRef {
    /// Validates `external_id` as a label value and derives its backend name.
    pub fn new(external_id: &str, naming: &NamingPolicy) -> Result<Self, IdentifierError> {
        let label = label_value(external_id)?;
        let backend_name = naming.derive_name(external_id)?;

        Ok(Self {
            external_id: label.to_string(),
            backend_name,
        })
    }
}

/// Returns the identity label value for `external_id`, which is the id itself.
///
/// Rejects ids Kubernetes would not accept as a label value.
pub fn label_value(external_id: &str) -> Result<&str, IdentifierError> {
    if external_id.is_empty() {
        return Err(IdentifierError::Empty);
    }

    if external_id.len() > MAX_LABEL_VALUE_LENGTH {
        return Err(IdentifierError::TooLong {
            length: external_id.len(),
        });
    }

    let bytes = external_id.as_bytes();
    let valid_edges =
        bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric();
    let valid_body = bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if !valid_edges || !valid_body {
        return Err(IdentifierError::InvalidCharacters);
    }

    Ok(external_id)
}

/// Reads the external id from a resource's identity label.
///
/// Resources without the label, or with an empty value, were not created by
/// the gateway and yield `None`.
pub fn extract_id(resource: &ManagedResource) -> Option<&str> {
    resource
        .labels
        .get(IDENTITY_LABEL_KEY)
        .map(String::as_str)
        .filter(|id| !id.is_empty())
}

/// Checks the RFC 1123 label rules resource names must follow.
fn validate_dns_label(name: &str, max_length: usize) -> Result<(), IdentifierError> {
    let invalid = |reason| IdentifierError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.len() > max_length {
        return Err(invalid("it is too long"));
    }

    let bytes = name.as_bytes();
    if !bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
    {
        return Err(invalid(
            "only lowercase alphanumeric characters and '-' are allowed",
        ));
    }

    let alphanumeric = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !bytes.first().is_some_and(alphanumeric) || !bytes.last().is_some_and(alphanumeric) {
        return Err(invalid("it must start and end with an alphanumeric character"));
    }

    Ok(())
}
