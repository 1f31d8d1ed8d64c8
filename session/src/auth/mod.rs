//! Auth operations: login, logout and renewal on top of the token store.

mod api;

use std::sync::Arc;

use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};

pub use api::{AuthApi, LogoutResponse};

use crate::error::{auth_error, decode_error, AuthErrorKind, Error};
use crate::http::ApiClient;
use crate::token::{self, Claims, TokenStore};
use crate::user::{fetch_user, User};

/// Produces and clears credentials through the token store.
#[derive(Clone)]
pub struct AuthOperations {
    auth: Arc<AuthApi>,
    api: ApiClient,
    store: Arc<TokenStore>,
}

impl AuthOperations {
    pub fn new(auth: Arc<AuthApi>, api: ApiClient, store: Arc<TokenStore>) -> Self {
        Self { auth, api, store }
    }

    /// Log in and return the full user record.
    ///
    /// A token whose subject cannot be decoded is discarded and reported as a
    /// decode error.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, Error> {
        self.auth.login(email, password).await?;
        self.current_user().await
    }

    /// Best-effort server logout. The local credential is always cleared.
    pub async fn logout(&self) {
        if let Err(e) = self.auth.logout().await {
            warn!("Server logout failed, clearing local session anyway: {e}");
        }
        self.store.clear();
    }

    pub async fn renew(&self) -> Result<SecretString, Error> {
        self.auth.refresh().await
    }

    /// Claims of the stored credential, if there is one and it decodes.
    pub fn current_claims(&self) -> Option<Claims> {
        let token = self.store.get()?;
        token::decode(token.expose_secret())
    }

    pub fn current_subject(&self) -> Option<String> {
        self.current_claims().map(|claims| claims.sub)
    }

    /// Fetch the user the stored credential was issued for.
    pub async fn current_user(&self) -> Result<User, Error> {
        if !self.store.has_token() {
            return Err(auth_error(AuthErrorKind::NoCredential, "No access token stored"));
        }

        let Some(claims) = self.current_claims() else {
            self.store.clear();
            return Err(decode_error("Access token has no readable subject"));
        };
        if claims.is_expired() {
            debug!(
                "Access token for {} expired at {:?}, the next request renews it",
                claims.sub,
                claims.expires_at()
            );
        }

        fetch_user(&self.api, &claims.sub).await
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }
}
