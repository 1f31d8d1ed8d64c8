//! Calls to the `/auth` endpoints over the bare client.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Method;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthErrorKind, Error, ErrorKind, HttpErrorKind};
use crate::http::{error_for_status, join_url, AuthHttpClient, Renewer};
use crate::token::TokenStore;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

/// Body returned by `/auth/logout`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// Login, logout and renewal against the auth endpoints.
///
/// Uses the client without the auth middleware, so none of these calls can
/// trigger a renewal of their own. The refresh secret is the httpOnly cookie
/// set by the server, carried by the shared cookie jar.
pub struct AuthApi {
    client: AuthHttpClient,
    base_url: Url,
    store: Arc<TokenStore>,
}

impl AuthApi {
    pub fn new(client: AuthHttpClient, base_url: Url, store: Arc<TokenStore>) -> Self {
        Self {
            client,
            base_url,
            store,
        }
    }

    /// POST `/auth/login` and store the issued access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<SecretString, Error> {
        let response = self
            .client
            .request(Method::POST, join_url(&self.base_url, "/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = error_for_status(response).await.map_err(|e| match e.status() {
            Some(400) | Some(401) => Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::Auth(AuthErrorKind::InvalidCredentials),
            },
            _ => e,
        })?;

        let token = self.store_token(response).await?;
        info!("Logged in as {email}");
        Ok(token)
    }

    /// POST `/auth/logout`. The caller decides what a failure means.
    pub async fn logout(&self) -> Result<LogoutResponse, Error> {
        let response = self
            .client
            .request(Method::POST, join_url(&self.base_url, "/auth/logout"))
            .send()
            .await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST `/auth/refresh`, store and return the renewed access token.
    ///
    /// Every failure, including transport errors, is reported as
    /// `AuthErrorKind::RenewalFailed` with the cause as its source.
    pub async fn refresh(&self) -> Result<SecretString, Error> {
        let renewal = async {
            let response = self
                .client
                .request(Method::POST, join_url(&self.base_url, "/auth/refresh"))
                .send()
                .await?;
            let response = error_for_status(response).await?;
            self.store_token(response).await
        };

        let token = renewal.await.map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Auth(AuthErrorKind::RenewalFailed),
        })?;
        debug!("Access token renewed");
        Ok(token)
    }

    async fn store_token(&self, response: reqwest::Response) -> Result<SecretString, Error> {
        let body: TokenResponse = response.json().await?;
        if body.access_token.is_empty() {
            return Err(Error {
                source: Some("empty access token".into()),
                error_kind: ErrorKind::Http(HttpErrorKind::InvalidResponse),
            });
        }

        let token = SecretString::from(body.access_token);
        self.store.set(Some(token.clone()));
        Ok(token)
    }
}

#[async_trait]
impl Renewer for AuthApi {
    async fn renew(&self) -> Result<SecretString, Error> {
        self.refresh().await
    }
}
