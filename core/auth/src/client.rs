//! Bearer-authenticated HTTP client with one-shot token refresh.

use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenType};
use oauth2::http::StatusCode;
use oauth2::{
    AuthType, ClientId, ClientSecret, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use driveup_common::{Error, Result, Secret};

use crate::credentials::{CredentialStore, RefreshedToken};
use crate::transport::{header_value, HttpRequest, HttpResponse, HttpTransport};

/// How a single attempt ended.
enum Attempt {
    /// 2xx, or 308 between resumable chunks.
    Accepted(HttpResponse),
    /// 401: the access token was rejected.
    Unauthorized(HttpResponse),
    /// Any other status.
    Rejected(HttpResponse),
}

impl Attempt {
    fn classify(response: HttpResponse) -> Self {
        if response.is_accepted() {
            Attempt::Accepted(response)
        } else if response.status == 401 {
            Attempt::Unauthorized(response)
        } else {
            Attempt::Rejected(response)
        }
    }
}

/// HTTP client that signs every request with the stored bearer token.
///
/// The token is read from the credential store on every request and never
/// cached. A 401 triggers exactly one refresh grant and one replay of the
/// request; whatever the replay returns is final.
pub struct AuthenticatedClient {
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore,
}

impl AuthenticatedClient {
    /// Create a client over `transport`, authenticating from `store`.
    pub fn new(transport: Arc<dyn HttpTransport>, store: CredentialStore) -> Self {
        Self { transport, store }
    }

    /// The credential store backing this client.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Send `request` and return the raw response.
    ///
    /// Headers already set on `request` take precedence over the injected
    /// `Authorization` header.
    ///
    /// # Errors
    /// - `Http` for any status other than 2xx/308 that survives recovery
    /// - `AuthRefreshFailed` if a 401 could not be recovered by refreshing
    /// - `Network` if no response was received
    /// - Credential store errors if the documents cannot be read
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        match self.attempt(&request).await? {
            Attempt::Accepted(response) => Ok(response),
            Attempt::Rejected(response) => Err(response.into_error()),
            Attempt::Unauthorized(_) => {
                warn!(method = %request.method, url = %request.url, "Access token rejected, refreshing");
                self.refresh().await?;

                match self.attempt(&request).await? {
                    Attempt::Accepted(response) => Ok(response),
                    Attempt::Unauthorized(response) | Attempt::Rejected(response) => {
                        Err(response.into_error())
                    }
                }
            }
        }
    }

    /// Send `request` and decode the response body as JSON.
    pub async fn request_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        self.request(request).await?.json()
    }

    /// Run the refresh grant against the stored token endpoint and persist
    /// the new access token.
    ///
    /// The grant is a form POST carrying `client_id`, `client_secret`,
    /// `refresh_token` and `grant_type=refresh_token`, sent through this
    /// client's transport.
    ///
    /// # Errors
    /// - `AuthRefreshFailed` if the endpoint is unreachable, rejects the grant,
    ///   or returns no usable `access_token`/`token_type`
    /// - Credential store errors if the documents cannot be read or written
    pub async fn refresh(&self) -> Result<()> {
        let client = self.store.client_credentials().await?;
        let token = self.store.token().await?;

        let token_url = TokenUrl::new(client.token_uri.clone())
            .map_err(|e| Error::AuthRefreshFailed(format!("invalid token_uri: {}", e)))?;
        let oauth = BasicClient::new(ClientId::new(client.client_id.clone()))
            .set_client_secret(ClientSecret::new(client.client_secret.expose().to_string()))
            .set_token_uri(token_url)
            .set_auth_type(AuthType::RequestBody);

        let refresh_token = RefreshToken::new(token.refresh_token.expose().to_string());
        let http_client = |request: oauth2::HttpRequest| self.send_grant(request);
        let response = oauth
            .exchange_refresh_token(&refresh_token)
            .request_async(&http_client)
            .await
            .map_err(|e| Error::AuthRefreshFailed(describe_grant_error(e)))?;

        let access_token = response.access_token().secret();
        if access_token.is_empty() {
            return Err(Error::AuthRefreshFailed(
                "response has an empty access_token".to_string(),
            ));
        }

        let refreshed = RefreshedToken {
            access_token: Secret::new(access_token.as_str()),
            token_type: token_type_name(response.token_type()),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret())
                .filter(|t| !t.is_empty())
                .map(|t| Secret::new(t.as_str())),
        };

        self.store.store_refreshed_token(&refreshed).await?;
        info!("Access token refreshed");

        Ok(())
    }

    /// Carry one oauth2 token request over the transport.
    ///
    /// oauth2 needs a `Send + Sync` future, so the exchange runs as a task
    /// and only its join handle is awaited here.
    fn send_grant(
        &self,
        request: oauth2::HttpRequest,
    ) -> impl Future<Output = Result<oauth2::HttpResponse>> + Send + Sync + 'static {
        let (parts, body) = request.into_parts();
        let mut outgoing = HttpRequest::new(parts.method, parts.uri.to_string()).bytes(body);
        outgoing.headers = parts.headers;

        let transport = self.transport.clone();
        let exchange = tokio::spawn(async move { transport.execute(outgoing).await });

        async move {
            let response = exchange
                .await
                .map_err(|e| Error::Network(format!("Token request aborted: {}", e)))??;

            let status = StatusCode::from_u16(response.status)
                .map_err(|e| Error::Network(format!("Invalid status from token endpoint: {}", e)))?;
            let mut converted = oauth2::HttpResponse::new(response.body.to_vec());
            *converted.status_mut() = status;
            *converted.headers_mut() = response.headers;
            Ok(converted)
        }
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<Attempt> {
        let token = self.store.bearer_token().await?;

        let mut outgoing = request.clone();
        if !outgoing.headers.contains_key(AUTHORIZATION) {
            outgoing
                .headers
                .insert(AUTHORIZATION, header_value(&token.authorization())?);
        }

        let response = self.transport.execute(outgoing).await?;
        debug!(method = %request.method, url = %request.url, status = response.status, "Request completed");

        Ok(Attempt::classify(response))
    }
}

/// Scheme name as it goes into the `Authorization` header.
fn token_type_name(token_type: &BasicTokenType) -> String {
    match token_type {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    }
}

fn describe_grant_error(err: RequestTokenError<Error, BasicErrorResponse>) -> String {
    match err {
        RequestTokenError::ServerResponse(response) => {
            format!("token endpoint rejected the grant: {}", response)
        }
        RequestTokenError::Request(e) => e.to_string(),
        RequestTokenError::Parse(e, body) => format!(
            "unreadable token response ({}): {}",
            e,
            String::from_utf8_lossy(&body)
        ),
        RequestTokenError::Other(reason) => reason,
    }
}
