//! Common types used throughout driveup.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identifier of a remote Drive object (file or folder).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriveId(String);

impl DriveId {
    /// Create a new DriveId from a string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty and free of whitespace
    ///
    /// # Errors
    /// - Returns error if id is empty or contains whitespace
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Drive id cannot be empty".to_string(),
            ));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(crate::Error::InvalidInput(format!(
                "Drive id cannot contain whitespace: {:?}",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credential string that zeroizes on drop and never prints its value.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret for use on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {} chars])", self.0.chars().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_drive_id_creation() {
        let id = DriveId::new("1AbC-xyz_09").unwrap();
        assert_eq!(id.as_str(), "1AbC-xyz_09");
        assert_eq!(id.to_string(), "1AbC-xyz_09");
    }

    #[test]
    fn test_drive_id_rejects_empty_and_whitespace() {
        assert!(DriveId::new("").is_err());
        assert!(DriveId::new("abc def").is_err());
    }

    #[test]
    fn test_drive_id_serializes_as_plain_string() {
        let id = DriveId::new("root").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"root\"");
    }

    #[test]
    fn test_secret_round_trips_transparently() {
        let secret: Secret = serde_json::from_str("\"ya29.token\"").unwrap();
        assert_eq!(secret.expose(), "ya29.token");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"ya29.token\"");
    }

    proptest! {
        #[test]
        fn secret_debug_never_leaks(value in "[a-zA-Z0-9._-]{4,64}") {
            let rendered = format!("{:?}", Secret::new(value.clone()));
            prop_assert!(!rendered.contains(&value));
            prop_assert!(rendered.contains("REDACTED"));
        }
    }
}
