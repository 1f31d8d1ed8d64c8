//! In-memory holder for the current access token.

use log::trace;
use secrecy::SecretString;
use tokio::sync::watch;

/// Process-wide holder of the current access credential.
///
/// Constructed once at application start and shared as `Arc<TokenStore>`.
/// Every `set` atomically replaces the previous value, so at most one credential
/// is ever visible. Nothing is persisted: a restart always starts empty.
pub struct TokenStore {
    current: watch::Sender<Option<SecretString>>,
}

impl TokenStore {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// Replace the held credential. No validation is performed.
    pub fn set(&self, token: Option<SecretString>) {
        trace!("Access token {}", if token.is_some() { "replaced" } else { "cleared" });
        self.current.send_replace(token);
    }

    /// Current credential, if any.
    pub fn get(&self) -> Option<SecretString> {
        self.current.borrow().clone()
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn has_token(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Observe every replacement of the credential, including clears.
    pub fn subscribe(&self) -> watch::Receiver<Option<SecretString>> {
        self.current.subscribe()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
