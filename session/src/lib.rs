//! # session
//!
//! Client-side session and transport core of the beasybox application:
//! - in-memory access token store and unverified claims decoding
//! - the API client, which attaches the bearer token and renews it transparently
//!   on 401, with at most one renewal in flight
//! - login, logout and renewal against the `/auth` endpoints
//! - the session context every protected view gates on
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use session::{http::ClientBuilder, navigation::RouteState, SessionContext, Services};
//!
//! let routes = Arc::new(RouteState::new("/"));
//! let services = Services::build(&ClientBuilder::new(), routes.clone())?;
//! let session = SessionContext::new(services.auth.clone());
//! session.hydrate().await;
//! ```

pub mod account;
pub mod auth;
pub mod context;
pub mod error;
pub mod http;
pub mod navigation;
pub mod services;
pub mod token;
pub mod user;

pub use context::{Phase, SessionContext, SessionState};
pub use error::{Error, ErrorKind};
pub use services::Services;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    use crate::auth::AuthOperations;
    use crate::http::{ApiClient, ClientBuilder};
    use crate::navigation::{Navigator, RouteState};
    use crate::services::Services;
    use crate::token::TokenStore;

    pub struct Fixture {
        pub api: ApiClient,
        pub auth: AuthOperations,
        pub store: Arc<TokenStore>,
        pub routes: Arc<RouteState>,
    }

    /// Fully wired services against a mock server, without transient retries.
    pub fn session_fixture(server_url: &str) -> Fixture {
        let routes = Arc::new(RouteState::new("/"));
        let navigator: Arc<dyn Navigator> = routes.clone();
        let builder = ClientBuilder::new()
            .with_base_url(server_url)
            .with_max_retries(0);
        let services = Services::build(&builder, navigator).unwrap();

        Fixture {
            api: services.api,
            auth: services.auth,
            store: services.store,
            routes,
        }
    }

    /// Unsigned three-segment token for `sub`.
    pub fn token_for(sub: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}","exp":4102444800}}"#));
        format!("{header}.{payload}.sig")
    }

    pub fn user_json(id: &str) -> String {
        format!(
            r#"{{"id":"{id}","email":"a@b.com","role":"USER","isOnboarded":false,"createdAt":"2025-03-01T12:00:00Z"}}"#
        )
    }
}
