//! Bearer authentication middleware with transparent renewal on 401.

use std::sync::Arc;

use async_trait::async_trait;
use http::Extensions;
use log::{debug, warn};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use secrecy::{ExposeSecret, SecretString};

use super::refresh::{RefreshCoordinator, Ticket};
use crate::error::{auth_error, http_error, AuthErrorKind, Error, HttpErrorKind};
use crate::navigation::Navigator;
use crate::token::TokenStore;

/// Something able to exchange the server-held refresh secret for a new access token.
#[async_trait]
pub trait Renewer: Send + Sync {
    async fn renew(&self) -> Result<SecretString, Error>;
}

/// Marker placed in a request's extensions once it has been replayed after a renewal.
///
/// A request carrying it is never renewed again, so a server that keeps answering
/// 401 cannot cause a retry loop.
#[derive(Debug, Clone, Copy)]
pub struct Retried;

/// Attaches the current access token to every request and survives exactly one
/// renewal-and-replay cycle when the server answers 401.
pub struct AuthMiddleware {
    store: Arc<TokenStore>,
    renewer: Arc<dyn Renewer>,
    navigator: Arc<dyn Navigator>,
    coordinator: Arc<RefreshCoordinator>,
    login_path: String,
}

impl AuthMiddleware {
    pub fn new(
        store: Arc<TokenStore>,
        renewer: Arc<dyn Renewer>,
        navigator: Arc<dyn Navigator>,
        coordinator: Arc<RefreshCoordinator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            renewer,
            navigator,
            coordinator,
            login_path: login_path.into(),
        }
    }

    /// Obtain the token to replay a rejected request with.
    ///
    /// `sent` is the token the rejected request carried. If the store already holds
    /// a different token, another request renewed it in the meantime and the replay
    /// can use it without a second renewal.
    async fn renewed_token(&self, sent: Option<&SecretString>) -> Result<SecretString, Error> {
        if let Some(current) = self.store.get() {
            let stale = sent.is_some_and(|sent| sent.expose_secret() == current.expose_secret());
            if !stale {
                debug!("Token already renewed by a concurrent request");
                return Ok(current);
            }
        }

        match self.coordinator.begin() {
            Ticket::Waiter(rx) => match rx.await {
                Ok(Some(token)) => Ok(token),
                _ => Err(auth_error(
                    AuthErrorKind::RenewalFailed,
                    "Renewal failed while this request was queued",
                )),
            },
            Ticket::Leader(guard) => match self.renewer.renew().await {
                Ok(token) => {
                    self.store.set(Some(token.clone()));
                    guard.release(Some(token.clone()));
                    Ok(token)
                }
                Err(e) => {
                    warn!("Access token renewal failed, ending session: {e}");
                    self.store.clear();
                    self.navigator.navigate(&self.login_path);
                    guard.release(None);
                    Err(e)
                }
            },
        }
    }
}

fn attach(request: &mut Request, token: &SecretString) -> Result<(), Error> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
        .map_err(|_| http_error(HttpErrorKind::BuilderFailed, "Access token is not a valid header value"))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let sent = self.store.get();
        if let Some(token) = &sent {
            attach(&mut req, token).map_err(reqwest_middleware::Error::middleware)?;
        }

        let replay = req.try_clone();
        let response = next.clone().run(req, extensions).await?;

        if response.status() != StatusCode::UNAUTHORIZED || extensions.get::<Retried>().is_some() {
            return Ok(response);
        }

        let Some(mut replay) = replay else {
            warn!("Request body cannot be replayed, returning 401 to caller");
            return Ok(response);
        };
        extensions.insert(Retried);

        let token = self
            .renewed_token(sent.as_ref())
            .await
            .map_err(reqwest_middleware::Error::middleware)?;
        attach(&mut replay, &token).map_err(reqwest_middleware::Error::middleware)?;

        debug!("Replaying {} {} with renewed token", replay.method(), replay.url().path());
        next.run(replay, extensions).await
    }
}
