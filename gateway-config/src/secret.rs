use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;

/// A [`SecretString`] that can travel through configuration files and JSON bodies.
///
/// The plain value is only materialized while serializing; [`std::fmt::Debug`]
/// output stays redacted, so configs holding API keys can be logged safely.
#[derive(Clone, Debug)]
pub struct SerializableSecretString(SecretString);

impl SerializableSecretString {
    /// Returns the secret value.
    ///
    /// Callers must not log or persist the returned string.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Deref for SerializableSecretString {
    type Target = SecretString;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for SerializableSecretString {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for SerializableSecretString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<SerializableSecretString> for SecretString {
    fn from(value: SerializableSecretString) -> Self {
        value.0
    }
}

impl Serialize for SerializableSecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.expose_secret())
    }
}

impl<'de> Deserialize<'de> for SerializableSecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self(value.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secret = SerializableSecretString::from("hunter2");

        let rendered = format!("{secret:?}");

        assert!(!rendered.contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }
}
