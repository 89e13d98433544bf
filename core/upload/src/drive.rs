//! Google Drive API calls used by the uploader.

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use driveup_auth::{header_value, AuthenticatedClient, HttpRequest, HttpResponse, ReqwestTransport};
use driveup_common::{DriveId, Error, Result};

use crate::config::{DriveEndpoints, UploadConfig};
use crate::plan::{empty_content_range, ChunkRange};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    #[serde(default)]
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// Drive API client over an authenticated HTTP client.
pub struct DriveClient {
    auth: AuthenticatedClient,
    endpoints: DriveEndpoints,
}

impl DriveClient {
    /// Create a client for `endpoints`.
    pub fn new(auth: AuthenticatedClient, endpoints: DriveEndpoints) -> Self {
        Self { auth, endpoints }
    }

    /// Build a client talking to the network with the configured credentials.
    ///
    /// # Errors
    /// - Invalid configuration
    /// - HTTP client construction failure
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config.user_agent)?);
        let auth = AuthenticatedClient::new(transport, config.credential_store());
        Ok(Self::new(auth, config.endpoints.clone()))
    }

    /// The authenticated client requests go through.
    pub fn auth(&self) -> &AuthenticatedClient {
        &self.auth
    }

    /// The endpoints in use.
    pub fn endpoints(&self) -> &DriveEndpoints {
        &self.endpoints
    }

    /// Create a folder named `name` inside `parent`.
    ///
    /// Metadata only; no content is sent.
    pub async fn create_folder(&self, name: &str, parent: &DriveId) -> Result<DriveFile> {
        let metadata = serde_json::json!({
            "parents": [parent.as_str()],
            "name": name,
            "mimeType": FOLDER_MIME_TYPE
        });

        let folder: DriveFile = self
            .auth
            .request_json(HttpRequest::post(self.endpoints.files_url.as_str()).json(metadata))
            .await?;

        info!(folder = name, parent = %parent, id = %folder.id, "Created folder");
        Ok(folder)
    }

    /// Start a resumable upload session and return its URI.
    ///
    /// # Errors
    /// - `SessionInit` if the request is refused or no `Location` comes back
    /// - `AuthRefreshFailed` or credential store errors from authentication
    pub async fn start_resumable_upload(
        &self,
        name: &str,
        parent: &DriveId,
        mime_type: &str,
    ) -> Result<String> {
        let metadata = serde_json::json!({
            "parents": [parent.as_str()],
            "name": name,
            "mimeType": mime_type
        });

        let request = HttpRequest::post(self.endpoints.upload_url.as_str())
            .query("uploadType", "resumable")
            .json(metadata);

        let response = self.auth.request(request).await.map_err(|e| match e {
            Error::Http { .. } | Error::Network(_) | Error::Serialization(_) => {
                Error::SessionInit(e.to_string())
            }
            other => other,
        })?;

        let upload_uri = response
            .header(LOCATION.as_str())
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| {
                Error::SessionInit(format!(
                    "No upload URI in response (status {})",
                    response.status
                ))
            })?
            .to_string();

        debug!(file = name, "Opened upload session");
        Ok(upload_uri)
    }

    /// Send one chunk of a `total`-byte file to an open session.
    ///
    /// # Errors
    /// - `ChunkTransfer` wrapping whatever stopped the chunk
    pub async fn upload_chunk(
        &self,
        upload_uri: &str,
        range: ChunkRange,
        total: u64,
        data: Vec<u8>,
    ) -> Result<HttpResponse> {
        let result = self.send_chunk(upload_uri, range, total, data).await;
        result.map_err(|e| Error::ChunkTransfer {
            start: range.start,
            end: range.end,
            source: Box::new(e),
        })
    }

    /// Finalize a session for a zero-byte file.
    pub async fn finalize_empty_upload(&self, upload_uri: &str) -> Result<HttpResponse> {
        let request = HttpRequest::post(upload_uri)
            .header(CONTENT_LENGTH, 0u64.into())
            .header(CONTENT_RANGE, header_value(empty_content_range())?);

        self.auth
            .request(request)
            .await
            .map_err(|e| Error::ChunkTransfer {
                start: 0,
                end: 0,
                source: Box::new(e),
            })
    }

    async fn send_chunk(
        &self,
        upload_uri: &str,
        range: ChunkRange,
        total: u64,
        data: Vec<u8>,
    ) -> Result<HttpResponse> {
        if data.len() as u64 != range.len() {
            return Err(Error::InvalidInput(format!(
                "Chunk holds {} bytes, range needs {}",
                data.len(),
                range.len()
            )));
        }

        let request = HttpRequest::post(upload_uri)
            .header(CONTENT_LENGTH, range.len().into())
            .header(CONTENT_RANGE, header_value(&range.content_range(total))?)
            .bytes(data);

        self.auth.request(request).await
    }
}
