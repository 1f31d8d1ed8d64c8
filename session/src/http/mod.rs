//! HTTP transport: client building, bearer authentication and renewal coalescing.

mod api;
mod client;
mod middleware;
mod refresh;
mod retry;

pub use api::ApiClient;
pub(crate) use api::error_for_status;
pub use client::{AuthHttpClient, ClientBuilder, HttpClientConfig, DEFAULT_BASE_URL};
pub(crate) use client::join_url;
pub use middleware::{AuthMiddleware, Renewer, Retried};
pub use refresh::{LeaderGuard, RefreshCoordinator, Ticket};
pub use retry::TransientBackoff;
