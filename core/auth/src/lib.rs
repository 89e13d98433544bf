//! OAuth2 credential persistence and authenticated HTTP for driveup.
//!
//! This crate owns everything between a caller's request and the wire:
//! - Credential and token documents on disk, read fresh on every request
//! - A transport seam with a reqwest implementation and a scripted one for tests
//! - Bearer header injection with a single refresh-and-retry on 401

pub mod client;
pub mod credentials;
pub mod scripted;
pub mod transport;

pub use client::AuthenticatedClient;
pub use credentials::{
    BearerToken, ClientCredentials, CredentialStore, DocumentKind, JsonDocument, RefreshedToken,
    TokenRecord,
};
pub use scripted::ScriptedTransport;
pub use transport::{
    header_value, HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, ReqwestTransport,
};
