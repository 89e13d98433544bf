//! Uploader configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use driveup_auth::CredentialStore;
use driveup_common::{Error, Result};

/// Google Drive metadata API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
/// Directory under the user's home holding `credentials.json` and `token.json`.
pub const DEFAULT_AUTH_DIR: &str = ".gdriver";
/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("driveup/", env!("CARGO_PKG_VERSION"));

/// Drive endpoints used for folder creation and upload initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEndpoints {
    /// Files collection of the metadata API.
    pub files_url: String,
    /// Files collection of the upload API.
    pub upload_url: String,
}

impl DriveEndpoints {
    /// Endpoints rooted at the given API bases.
    pub fn new(api_base: &str, upload_base: &str) -> Self {
        Self {
            files_url: format!("{}/files", api_base.trim_end_matches('/')),
            upload_url: format!("{}/files", upload_base.trim_end_matches('/')),
        }
    }

    /// Check both URLs parse as absolute http(s) URLs.
    pub fn validate(&self) -> Result<()> {
        for raw in [&self.files_url, &self.upload_url] {
            let parsed = url::Url::parse(raw)
                .map_err(|e| Error::InvalidInput(format!("Invalid endpoint {}: {}", raw, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::InvalidInput(format!(
                    "Endpoint must be http or https: {}",
                    raw
                )));
            }
        }
        Ok(())
    }
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self::new(DRIVE_API_BASE, DRIVE_UPLOAD_BASE)
    }
}

/// Settings for an upload run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory holding the credential documents.
    pub auth_dir: PathBuf,
    /// Drive endpoints.
    #[serde(default)]
    pub endpoints: DriveEndpoints,
    /// Fixed chunk size in bytes; derived per file when absent.
    #[serde(default)]
    pub chunk_size: Option<u64>,
    /// User agent for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl UploadConfig {
    /// Configuration reading credentials from `auth_dir`.
    pub fn new(auth_dir: impl AsRef<Path>) -> Self {
        Self {
            auth_dir: auth_dir.as_ref().to_path_buf(),
            endpoints: DriveEndpoints::default(),
            chunk_size: None,
            user_agent: default_user_agent(),
        }
    }

    /// Configuration reading credentials from `~/.gdriver`.
    pub fn from_home() -> Result<Self> {
        Ok(Self::new(Self::default_auth_dir()?))
    }

    /// `~/.gdriver` for the current user.
    pub fn default_auth_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_AUTH_DIR))
            .ok_or_else(|| Error::InvalidInput("Cannot determine home directory".to_string()))
    }

    /// Read a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::DocumentNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let config: Self =
            serde_json::from_slice(&raw).map_err(|e| Error::MalformedDocument {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Set a fixed chunk size.
    pub fn with_chunk_size(mut self, chunk_size: Option<u64>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Override the Drive endpoints.
    pub fn with_endpoints(mut self, endpoints: DriveEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    /// - Chunk size of zero
    /// - Endpoints that are not http(s) URLs
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == Some(0) {
            return Err(Error::InvalidInput(
                "Chunk size must be a positive number of bytes".to_string(),
            ));
        }
        self.endpoints.validate()
    }

    /// Credential store over `auth_dir`.
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::from_dir(&self.auth_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_endpoints() {
        let endpoints = DriveEndpoints::default();
        assert_eq!(
            endpoints.files_url,
            "https://www.googleapis.com/drive/v3/files"
        );
        assert_eq!(
            endpoints.upload_url,
            "https://www.googleapis.com/upload/drive/v3/files"
        );
        assert!(endpoints.validate().is_ok());
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let endpoints = DriveEndpoints::new("http://127.0.0.1:9/api/", "http://127.0.0.1:9/up");
        assert_eq!(endpoints.files_url, "http://127.0.0.1:9/api/files");
        assert_eq!(endpoints.upload_url, "http://127.0.0.1:9/up/files");
    }

    #[test]
    fn test_invalid_endpoints_rejected() {
        let config = UploadConfig::new("/tmp/auth").with_endpoints(DriveEndpoints {
            files_url: "not a url".to_string(),
            upload_url: "ftp://example.com/files".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = UploadConfig::new("/tmp/auth").with_chunk_size(Some(0));
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_applies_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("driveup.json");
        std::fs::write(&path, r#"{"auth_dir": "/srv/creds", "chunk_size": 1048576}"#).unwrap();

        let config = UploadConfig::load(&path).unwrap();
        assert_eq!(config.auth_dir, PathBuf::from("/srv/creds"));
        assert_eq!(config.chunk_size, Some(1_048_576));
        assert_eq!(config.endpoints, DriveEndpoints::default());
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.json");
        assert!(matches!(
            UploadConfig::load(&missing),
            Err(Error::DocumentNotFound(_))
        ));

        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        assert!(matches!(
            UploadConfig::load(&broken),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_credential_store_paths() {
        let config = UploadConfig::new("/srv/creds");
        let store = config.credential_store();
        assert_eq!(
            store
                .document(driveup_auth::DocumentKind::Token)
                .path(),
            Path::new("/srv/creds/token.json")
        );
    }
}
