//! HTTP client construction.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest_middleware::ClientBuilder as MiddlewareBuilder;
use reqwest_retry::RetryTransientMiddleware;
use url::Url;

use super::{ApiClient, AuthMiddleware, RefreshCoordinator, Renewer, TransientBackoff};
use crate::error::{Error, ErrorKind, HttpErrorKind};
use crate::navigation::Navigator;
use crate::token::TokenStore;

/// Default API origin used for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// API origin every relative path is joined to.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry budget for transient transport failures.
    pub max_retries: u32,
    /// Route the application is sent to when renewal fails.
    pub login_path: String,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            login_path: "/login".to_string(),
            user_agent: format!("beasybox-session/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Plain client for the auth endpoints.
///
/// It carries no auth middleware, so login and renewal can never trigger a
/// recursive renewal. It shares its cookie jar with the intercepted client.
pub type AuthHttpClient = reqwest_middleware::ClientWithMiddleware;

/// Builder for the two HTTP clients the session layer needs.
pub struct ClientBuilder {
    config: HttpClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.config.login_path = login_path.into();
        self
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Parse the configured origin.
    pub fn base_url(&self) -> Result<Url, Error> {
        Url::parse(&self.config.base_url).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Http(HttpErrorKind::BuilderFailed),
        })
    }

    /// Build the shared reqwest client with cookie support and JSON defaults.
    pub fn build_inner(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .build()?;
        Ok(client)
    }

    /// Wrap a reqwest client with the transient retry middleware only.
    pub fn build_auth_client(&self, inner: reqwest::Client) -> AuthHttpClient {
        MiddlewareBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(self.retry_policy()))
            .build()
    }

    /// Wrap a reqwest client with bearer authentication, renewal and retries.
    ///
    /// The auth middleware is outermost, so transient retries happen inside a
    /// single renewal attempt.
    pub fn build_api_client(
        &self,
        inner: reqwest::Client,
        store: Arc<TokenStore>,
        renewer: Arc<dyn Renewer>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<ApiClient, Error> {
        let base_url = self.base_url()?;
        let coordinator = Arc::new(RefreshCoordinator::new());
        let auth = AuthMiddleware::new(
            store,
            renewer,
            navigator,
            coordinator.clone(),
            self.config.login_path.clone(),
        );
        let client = MiddlewareBuilder::new(inner)
            .with(auth)
            .with(RetryTransientMiddleware::new_with_policy(self.retry_policy()))
            .build();

        Ok(ApiClient::new(client, base_url, coordinator))
    }

    fn retry_policy(&self) -> TransientBackoff {
        TransientBackoff::new(self.config.max_retries)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Join a relative API path, optionally carrying a query string, to the origin.
pub(crate) fn join_url(base_url: &Url, path: &str) -> Url {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = base_url.clone();
    url.set_path(&format!(
        "{}/{}",
        base_url.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    ));
    url.set_query(query);
    url
}
