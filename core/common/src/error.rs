//! Common error types for driveup.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for driveup operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A persisted credential document does not exist.
    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    /// A persisted credential document is not valid JSON or has the wrong shape.
    #[error("Malformed document {}: {reason}", .path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    /// A requested field (or its enclosing section) is absent.
    #[error("Field not found: {}", field_label(.key, .section.as_deref()))]
    FieldNotFound {
        key: String,
        section: Option<String>,
    },

    /// The server answered with a status that is not accepted.
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// The token refresh round trip failed or returned incomplete fields.
    #[error("Token refresh failed: {0}")]
    AuthRefreshFailed(String),

    /// A resumable upload session could not be opened.
    #[error("Upload session could not be started: {0}")]
    SessionInit(String),

    /// A chunk could not be delivered to the upload session.
    #[error("Chunk bytes {start}-{end} failed: {source}")]
    ChunkTransfer {
        start: u64,
        end: u64,
        #[source]
        source: Box<Error>,
    },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// HTTP status carried by this error, if any.
    ///
    /// Looks through `ChunkTransfer` to the underlying failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::ChunkTransfer { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the server rejected the request's credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

fn field_label(key: &str, section: Option<&str>) -> String {
    match section {
        Some(section) => format!("{}.{}", section, key),
        None => key.to_string(),
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
