use std::time::Duration;

use bookline_domain::{BackendKind, BooklineError, Result};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{status_error, InfraError};

const DEFAULT_USER_AGENT: &str = concat!("bookline/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for backend adapters.
///
/// Every request is a single attempt bounded by the client timeout. Non-2xx
/// responses are classified into [`BooklineError`] using the backend kind
/// for context. Retrying reads is the caller's decision.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    /// Returns `BooklineError::Config` if the TLS backend cannot initialise.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the request and return the raw response, whatever its status.
    ///
    /// # Errors
    /// Returns `RemoteUnavailable` for connection failures and timeouts.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build().map_err(|err| BooklineError::from(InfraError::from(err)))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, url = %redacted(&url), "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, url = %redacted(&url), status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, url = %redacted(&url), error = %err, "HTTP request failed");
                Err(InfraError::from(err).into())
            }
        }
    }

    /// Execute the request, require a success status, and decode the JSON body.
    ///
    /// # Errors
    /// Returns the status mapping of [`status_error`](crate::errors::status_error)
    /// for non-2xx responses and `RemoteUnavailable` if the body does not decode.
    pub async fn send_json<T>(&self, kind: BackendKind, builder: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.checked(kind, builder).await?;
        let body = response.text().await.map_err(|err| BooklineError::from(InfraError::from(err)))?;
        // Some backends answer 200/204 with an empty body where JSON is documented.
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|err| {
            BooklineError::RemoteUnavailable(format!(
                "{} returned an unexpected response body: {err}",
                kind.display_name()
            ))
        })
    }

    /// Execute the request and require a success status, discarding the body.
    ///
    /// # Errors
    /// Returns the status mapping of [`status_error`](crate::errors::status_error)
    /// for non-2xx responses.
    pub async fn send_empty(&self, kind: BackendKind, builder: RequestBuilder) -> Result<()> {
        self.checked(kind, builder).await.map(|_| ())
    }

    async fn checked(&self, kind: BackendKind, builder: RequestBuilder) -> Result<Response> {
        let response = self.send(builder).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(kind, status, &body))
    }
}

/// Drop the query string from logged URLs; several backends take tokens there.
fn redacted(url: &reqwest::Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(10), user_agent: None, default_headers: None }
    }
}

impl HttpClientBuilder {
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    #[must_use]
    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns `BooklineError::Config` if reqwest rejects the settings.
    pub fn build(self) -> Result<HttpClient> {
        let agent = self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut builder = ReqwestClient::builder().timeout(self.timeout).user_agent(agent).no_proxy();

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| BooklineError::from(InfraError::from(err)))?;

        Ok(HttpClient { client })
    }
}
