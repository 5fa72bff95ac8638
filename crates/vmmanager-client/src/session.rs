//! Authenticated HTTP transport.
//!
//! [`Session`] is the capability the rest of the client depends on: plain JSON
//! reads and writes against paths relative to the API base URL. [`HttpSession`]
//! implements it over `reqwest`.

use crate::Result;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use vmmanager_core::client::HttpConfig;
use vmmanager_core::{ClientConfig, Error};

const USER_AGENT: &str = concat!("vmmanager-client/", env!("CARGO_PKG_VERSION"));

/// Header carrying the session token on every request.
pub const TOKEN_HEADER: &str = "x-xsrf-token";

/// Transport used by the fetcher, the poller and the mutation orchestrator.
///
/// Mutating calls return `None` when the service answered with an empty body
/// (or a literal JSON `null`); callers decide whether that is an error.
#[async_trait]
pub trait Session: Send + Sync {
    /// `GET` a path and decode the body as JSON.
    async fn get_json(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value>;

    /// `POST` a JSON body.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Option<Value>>;

    /// `DELETE` with an optional JSON body, decoding the response.
    async fn delete_json(&self, path: &str, body: Option<&Value>) -> Result<Option<Value>>;

    /// `DELETE` discarding the response body.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Exchange credentials for a session token.
    async fn login(&self, username: &str, password: &str) -> Result<()>;

    /// Use a pre-issued token for subsequent requests.
    fn set_api_token(&self, token: &str);
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// `reqwest`-backed [`Session`].
#[derive(Debug)]
pub struct HttpSession {
    http: Client,
    base_url: Url,
    auth_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl HttpSession {
    /// Build a session for the API described by `config`.
    ///
    /// A token present in the configuration is installed right away; username and
    /// password are only used by an explicit [`Session::login`].
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = normalize_base_url(config.parse_api_url()?);
        let auth_url = base_url.join(&config.auth_path).map_err(|err| {
            Error::ConfigError(format!(
                "Invalid auth path `{}`: {err}",
                config.auth_path
            ))
        })?;

        let http = build_http_client(&config.http_config())?;

        let session = Self {
            http,
            base_url,
            auth_url,
            token: RwLock::new(None),
        };
        if let Some(token) = &config.api_token {
            session.set_api_token(token);
        }
        Ok(session)
    }

    /// Return the base URL every relative path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// True when a token is installed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .map(|token| token.is_some())
            .unwrap_or(false)
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid API path `{path}`: {err}")))
    }

    fn current_token(&self) -> Option<String> {
        self.token
            .read()
            .ok()
            .and_then(|token| token.as_ref().map(|t| t.expose_secret().to_string()))
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .query(query)
            .header(ACCEPT, "application/json");

        if let Some(token) = self.current_token() {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        debug!(%method, path = url.path(), ?query, "VMmanager request");

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(map_status_to_error(status, text))
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = self.build_url(path)?;
        let response = self.execute(method.clone(), url, query, body).await?;
        let text = response.text().await?;
        decode_body(&text).map_err(|err| {
            Error::DecodeError(format!("Failed to parse response for {method} `{path}`: {err}"))
        })
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn get_json(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value> {
        self.send_json(Method::GET, path, query, None)
            .await?
            .ok_or_else(|| Error::DecodeError(format!("Empty response body for GET `{path}`")))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Option<Value>> {
        self.send_json(Method::POST, path, &[], Some(body)).await
    }

    async fn delete_json(&self, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        self.send_json(Method::DELETE, path, &[], body).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.build_url(path)?;
        self.execute(Method::DELETE, url, &[], None).await.map(|_| ())
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let body = serde_json::json!({ "email": username, "password": password });
        info!(username, "Requesting VMmanager session token");

        let response = self
            .execute(Method::POST, self.auth_url.clone(), &[], Some(&body))
            .await
            .map_err(|err| match err {
                Error::NotFound(text) => {
                    Error::AuthenticationFailed(format!("auth endpoint not found: {text}"))
                }
                other => other,
            })?;

        let token = response.json::<TokenResponse>().await.map_err(|err| {
            Error::AuthenticationFailed(format!("Failed to parse token response: {err}"))
        })?;
        self.set_api_token(&token.token);
        Ok(())
    }

    fn set_api_token(&self, token: &str) {
        match self.token.write() {
            Ok(mut slot) => *slot = Some(SecretString::from(token.to_string())),
            Err(_) => warn!("token lock poisoned; keeping previous token"),
        }
    }
}

fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn build_http_client(config: &HttpConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true);

    if !config.tls_verify {
        warn!("TLS verification disabled for VMmanager client");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|err| Error::ConfigError(format!("Failed to build VMmanager HTTP client: {err}")))
}

fn decode_body(text: &str) -> serde_json::Result<Option<Value>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(text)? {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

fn map_status_to_error(status: StatusCode, text: String) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(text),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::AuthenticationFailed(format!("VMmanager rejected credentials: {text}"))
        }
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            Error::ServiceUnavailable(format!("VMmanager temporarily unavailable: {text}"))
        }
        status if status.is_server_error() => {
            Error::ServiceUnavailable(format!("VMmanager server error {status}: {text}"))
        }
        _ => Error::HttpError(format!("VMmanager error {status}: {text}")),
    }
}
