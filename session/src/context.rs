//! Application-wide session state.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::AuthOperations;
use crate::error::Error;
use crate::user::User;

/// Where the session is in its lifecycle.
///
/// Starts in `Hydrating` and leaves it exactly once. Afterwards only `login`
/// and `logout` move between the two terminal phases.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Hydrating,
    Authenticated(User),
    Anonymous,
}

/// Snapshot the rest of the application renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub is_loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl From<&Phase> for SessionState {
    fn from(phase: &Phase) -> Self {
        match phase {
            Phase::Hydrating => Self {
                user: None,
                is_loading: true,
            },
            Phase::Authenticated(user) => Self {
                user: Some(user.clone()),
                is_loading: false,
            },
            Phase::Anonymous => Self {
                user: None,
                is_loading: false,
            },
        }
    }
}

/// Sole authentication authority of the application.
///
/// Transport errors stop here: callers above this boundary only observe the
/// published [`Phase`], except for `login`, whose input errors are returned.
///
/// The context follows the token store: a credential cleared behind its back,
/// as when the API client gives up on renewal, ends an authenticated session.
pub struct SessionContext {
    auth: AuthOperations,
    phase: Arc<watch::Sender<Phase>>,
    watcher: JoinHandle<()>,
}

impl SessionContext {
    /// Must be called from within a tokio runtime.
    pub fn new(auth: AuthOperations) -> Self {
        let (phase, _) = watch::channel(Phase::Hydrating);
        let phase = Arc::new(phase);

        let mut tokens = auth.store().subscribe();
        let watched = phase.clone();
        let watcher = tokio::spawn(async move {
            while tokens.changed().await.is_ok() {
                let cleared = tokens.borrow_and_update().is_none();
                if cleared {
                    end_if_authenticated(&watched);
                }
            }
        });

        Self {
            auth,
            phase,
            watcher,
        }
    }

    /// Restore a session from the refresh cookie.
    ///
    /// Never fails: an anonymous visitor is an expected outcome, so every error
    /// ends in `Anonymous` with the credential cleared.
    pub async fn hydrate(&self) -> Phase {
        let phase = match self.restore().await {
            Ok(user) => {
                info!("Session restored for {}", user.email);
                Phase::Authenticated(user)
            }
            Err(e) => {
                info!("No session to restore: {e}");
                self.auth.store().clear();
                Phase::Anonymous
            }
        };

        self.phase.send_replace(phase.clone());
        phase
    }

    async fn restore(&self) -> Result<User, Error> {
        self.auth.renew().await?;
        self.auth.current_user().await
    }

    /// Log in with email and password. User-input errors are returned unchanged.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, Error> {
        let user = self.auth.login(email, password).await?;
        self.phase.send_replace(Phase::Authenticated(user.clone()));
        Ok(user)
    }

    /// Log out. Idempotent and infallible.
    pub async fn logout(&self) {
        if !self.is_authenticated() {
            warn!("Logout requested without an authenticated session");
        }
        self.auth.logout().await;
        self.phase.send_replace(Phase::Anonymous);
    }

    pub fn user(&self) -> Option<User> {
        self.reconcile();
        match &*self.phase.borrow() {
            Phase::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.reconcile();
        matches!(*self.phase.borrow(), Phase::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(*self.phase.borrow(), Phase::Hydrating)
    }

    pub fn phase(&self) -> Phase {
        self.reconcile();
        self.phase.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.reconcile();
        SessionState::from(&*self.phase.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn auth(&self) -> &AuthOperations {
        &self.auth
    }

    /// Catch up with a cleared store before the watcher task has run.
    fn reconcile(&self) {
        if !self.auth.store().has_token() {
            end_if_authenticated(&self.phase);
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

fn end_if_authenticated(phase: &watch::Sender<Phase>) {
    let ended = phase.send_if_modified(|phase| {
        if matches!(phase, Phase::Authenticated(_)) {
            *phase = Phase::Anonymous;
            true
        } else {
            false
        }
    });
    if ended {
        info!("Credential cleared, session ended");
    }
}
