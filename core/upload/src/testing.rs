//! Shared fixtures for unit tests.

use std::sync::Arc;
use tempfile::TempDir;

use driveup_auth::{AuthenticatedClient, CredentialStore, ScriptedTransport};

use crate::config::DriveEndpoints;
use crate::drive::DriveClient;

pub const TOKEN_URI: &str = "https://oauth2.test/token";
pub const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
pub const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Write a credentials/token pair into `temp` and open a store over it.
pub fn seed_credentials(temp: &TempDir) -> CredentialStore {
    std::fs::write(
        temp.path().join("credentials.json"),
        serde_json::json!({
            "installed": {
                "client_id": "cid",
                "client_secret": "cs",
                "token_uri": TOKEN_URI
            }
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        temp.path().join("token.json"),
        r#"{"access_token": "at", "token_type": "Bearer", "refresh_token": "rt"}"#,
    )
    .unwrap();
    CredentialStore::from_dir(temp.path())
}

/// Drive client over `transport` with seeded credentials.
pub fn drive_client(temp: &TempDir, transport: Arc<ScriptedTransport>) -> DriveClient {
    DriveClient::new(
        AuthenticatedClient::new(transport, seed_credentials(temp)),
        DriveEndpoints::default(),
    )
}
