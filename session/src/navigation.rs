//! Navigation seam used when a session ends unexpectedly.

use log::info;
use tokio::sync::watch;

/// Moves the application to another route.
///
/// The transport layer only ever asks for the login entry point, after a renewal
/// has been rejected. Rendering the route is the application's job.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that records the current route so the application can react to it.
pub struct RouteState {
    route: watch::Sender<String>,
}

impl RouteState {
    pub fn new(initial: &str) -> Self {
        let (route, _) = watch::channel(initial.to_string());
        Self { route }
    }

    pub fn current(&self) -> String {
        self.route.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.route.subscribe()
    }
}

impl Default for RouteState {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RouteState {
    fn navigate(&self, path: &str) {
        info!("Navigating to {path}");
        self.route.send_replace(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_updates_current_route() {
        let routes = RouteState::default();
        assert_eq!(routes.current(), "/");

        routes.navigate("/login");
        assert_eq!(routes.current(), "/login");
    }

    #[tokio::test]
    async fn test_subscribers_see_navigation() {
        let routes = RouteState::new("/chat");
        let mut rx = routes.subscribe();

        routes.navigate("/login");
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "/login");
    }
}
