//! Persisted OAuth2 client credentials and live token documents.
//!
//! Both documents are plain JSON files. The client credentials sit under an
//! `installed` section (the layout of a downloaded "desktop app" client
//! secret), the token fields sit at the top level. Fields this crate does not
//! know about are preserved across rewrites.
//!
//! There is no file locking: a single process is assumed to be the only
//! writer. Two processes sharing one token document may race on refresh.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use driveup_common::{Error, Result, Secret};

/// File name of the client credentials document.
pub const CREDENTIALS_FILE: &str = "credentials.json";
/// File name of the token document.
pub const TOKEN_FILE: &str = "token.json";
/// Section of the credentials document holding the client fields.
pub const INSTALLED_SECTION: &str = "installed";

/// The two documents a store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Client id, secret and token endpoint.
    Credentials,
    /// Access, refresh token and token type.
    Token,
}

impl DocumentKind {
    /// Section the document's fields are nested under, if any.
    pub fn section(&self) -> Option<&'static str> {
        match self {
            DocumentKind::Credentials => Some(INSTALLED_SECTION),
            DocumentKind::Token => None,
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            DocumentKind::Credentials => CREDENTIALS_FILE,
            DocumentKind::Token => TOKEN_FILE,
        }
    }
}

/// A JSON object document on disk with field-level get/set.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    /// Create a handle for the document at `path`. Nothing is read yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one string field, optionally nested under `section`.
    ///
    /// # Errors
    /// - `DocumentNotFound` if the file does not exist
    /// - `MalformedDocument` if it is not a JSON object or the field is not a string
    /// - `FieldNotFound` if the section or key is absent
    pub async fn get(&self, key: &str, section: Option<&str>) -> Result<String> {
        let root = self.read().await?;
        let container = self.container(&root, section)?;

        match container.get(key) {
            Some(Value::String(value)) => Ok(value.clone()),
            Some(other) => Err(self.malformed(format!(
                "field {} is not a string: {}",
                key, other
            ))),
            None => Err(Error::FieldNotFound {
                key: key.to_string(),
                section: section.map(str::to_string),
            }),
        }
    }

    /// Set one string field, optionally nested under `section`, and rewrite
    /// the whole document.
    ///
    /// The section must already exist; the key need not.
    pub async fn set(&self, key: &str, value: &str, section: Option<&str>) -> Result<()> {
        self.update(section, |fields| {
            fields.insert(key.to_string(), Value::String(value.to_string()));
        })
        .await
    }

    /// Apply `edit` to the fields of `section` (or the top level) and
    /// rewrite the document once.
    pub async fn update<F>(&self, section: Option<&str>, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let mut root = self.read().await?;

        let fields = match section {
            Some(name) => match root.get_mut(name) {
                Some(Value::Object(fields)) => fields,
                Some(_) => {
                    return Err(self.malformed(format!("section {} is not an object", name)))
                }
                None => {
                    return Err(Error::FieldNotFound {
                        key: name.to_string(),
                        section: None,
                    })
                }
            },
            None => &mut root,
        };
        edit(fields);

        self.write(&root).await
    }

    /// Deserialize the fields of `section` (or the top level) into `T`.
    ///
    /// Every name in `required` is checked first so a missing field reports
    /// as `FieldNotFound` rather than a generic decode failure.
    pub async fn load<T: DeserializeOwned>(
        &self,
        section: Option<&str>,
        required: &[&str],
    ) -> Result<T> {
        let root = self.read().await?;
        let container = self.container(&root, section)?;

        for key in required {
            if !container.contains_key(*key) {
                return Err(Error::FieldNotFound {
                    key: key.to_string(),
                    section: section.map(str::to_string),
                });
            }
        }

        serde_json::from_value(Value::Object(container.clone()))
            .map_err(|e| self.malformed(e.to_string()))
    }

    async fn read(&self) -> Result<Map<String, Value>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::DocumentNotFound(self.path.clone()))
            }
            Err(e) => return Err(Error::Io(e)),
        };

        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(root)) => Ok(root),
            Ok(_) => Err(self.malformed("top level is not an object".to_string())),
            Err(e) => Err(self.malformed(e.to_string())),
        }
    }

    /// Write through a sibling temp file and rename over the original.
    async fn write(&self, root: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_vec_pretty(root)
            .map_err(|e| Error::Serialization(format!("{}: {}", self.path.display(), e)))?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), "Rewrote document");
        Ok(())
    }

    fn container<'a>(
        &self,
        root: &'a Map<String, Value>,
        section: Option<&str>,
    ) -> Result<&'a Map<String, Value>> {
        match section {
            Some(name) => match root.get(name) {
                Some(Value::Object(fields)) => Ok(fields),
                Some(_) => Err(self.malformed(format!("section {} is not an object", name))),
                None => Err(Error::FieldNotFound {
                    key: name.to_string(),
                    section: None,
                }),
            },
            None => Ok(root),
        }
    }

    fn malformed(&self, reason: String) -> Error {
        Error::MalformedDocument {
            path: self.path.clone(),
            reason,
        }
    }
}

/// OAuth2 client registration, from the `installed` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret,
    pub token_uri: String,
}

impl ClientCredentials {
    const REQUIRED: [&'static str; 3] = ["client_id", "client_secret", "token_uri"];
}

/// The fields of the token document needed to sign a request.
#[derive(Debug, Clone, Deserialize)]
pub struct BearerToken {
    pub access_token: Secret,
    pub token_type: String,
}

impl BearerToken {
    const REQUIRED: [&'static str; 2] = ["access_token", "token_type"];

    /// Value for the `Authorization` header, e.g. `Bearer ya29...`.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose())
    }
}

/// The full token document, as needed by a refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRecord {
    pub access_token: Secret,
    pub token_type: String,
    pub refresh_token: Secret,
}

impl TokenRecord {
    const REQUIRED: [&'static str; 3] = ["access_token", "token_type", "refresh_token"];
}

/// Fields obtained from a successful refresh grant.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: Secret,
    pub token_type: String,
    /// Present only when the server rotated the refresh token.
    pub refresh_token: Option<Secret>,
}

/// Handle on the credentials and token documents.
///
/// Cheap to clone; holds paths only. Every read goes to disk.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials: JsonDocument,
    token: JsonDocument,
}

impl CredentialStore {
    /// Create a store from explicit document paths.
    pub fn new(credentials_path: impl AsRef<Path>, token_path: impl AsRef<Path>) -> Self {
        Self {
            credentials: JsonDocument::new(credentials_path),
            token: JsonDocument::new(token_path),
        }
    }

    /// Create a store for `credentials.json` and `token.json` inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join(DocumentKind::Credentials.file_name()),
            dir.join(DocumentKind::Token.file_name()),
        )
    }

    /// The document backing `kind`.
    pub fn document(&self, kind: DocumentKind) -> &JsonDocument {
        match kind {
            DocumentKind::Credentials => &self.credentials,
            DocumentKind::Token => &self.token,
        }
    }

    /// Read a field of `kind`, inside its default section.
    pub async fn get(&self, kind: DocumentKind, key: &str) -> Result<String> {
        self.document(kind).get(key, kind.section()).await
    }

    /// Update a field of `kind`, inside its default section.
    pub async fn set(&self, kind: DocumentKind, key: &str, value: &str) -> Result<()> {
        self.document(kind).set(key, value, kind.section()).await
    }

    /// Load and validate the client registration.
    pub async fn client_credentials(&self) -> Result<ClientCredentials> {
        self.credentials
            .load(DocumentKind::Credentials.section(), &ClientCredentials::REQUIRED)
            .await
    }

    /// Load the access token and its type.
    ///
    /// A refresh token is not required here; only `token` asks for it.
    pub async fn bearer_token(&self) -> Result<BearerToken> {
        self.token
            .load(DocumentKind::Token.section(), &BearerToken::REQUIRED)
            .await
    }

    /// Load and validate the full token document.
    pub async fn token(&self) -> Result<TokenRecord> {
        self.token
            .load(DocumentKind::Token.section(), &TokenRecord::REQUIRED)
            .await
    }

    /// Persist a refreshed token.
    ///
    /// `access_token` and `token_type` (and a rotated refresh token) land in
    /// one document rewrite, so no reader sees one without the other.
    pub async fn store_refreshed_token(&self, refreshed: &RefreshedToken) -> Result<()> {
        self.token
            .update(DocumentKind::Token.section(), |fields| {
                fields.insert(
                    "access_token".to_string(),
                    Value::String(refreshed.access_token.expose().to_string()),
                );
                fields.insert(
                    "token_type".to_string(),
                    Value::String(refreshed.token_type.clone()),
                );
                if let Some(rotated) = &refreshed.refresh_token {
                    fields.insert(
                        "refresh_token".to_string(),
                        Value::String(rotated.expose().to_string()),
                    );
                }
            })
            .await
    }
}
