use log::{error, info, warn};
use realtime::{Channel, ClientEvent, EventName, ServerEvent};
use service::{config::Config, logging::Logger};
use session::http::{ClientBuilder, HttpClientConfig};
use session::navigation::RouteState;
use session::{Phase, Services, SessionContext};
use std::sync::Arc;
use url::Url;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting beasybox client against {} [{}]",
        config.beasybox_api(),
        config.runtime_env()
    );

    let builder = ClientBuilder::with_config(HttpClientConfig {
        base_url: config.beasybox_api().to_string(),
        timeout: config.request_timeout(),
        max_retries: config.http_max_retries,
        login_path: config.login_path().to_string(),
        ..Default::default()
    });
    let routes = Arc::new(RouteState::new("/"));

    let services = match Services::build(&builder, routes.clone()) {
        Ok(services) => services,
        Err(e) => {
            error!("Failed to build HTTP clients: {e}");
            std::process::exit(1);
        }
    };
    let session = SessionContext::new(services.auth.clone());

    if session.hydrate().await == Phase::Anonymous {
        let Some((email, password)) = config.credentials() else {
            warn!("No session to restore and no credentials configured, nothing to do");
            return;
        };
        if let Err(e) = session.login(email, password).await {
            error!("Login failed: {e}");
            std::process::exit(1);
        }
    }

    let Some(user) = session.user() else {
        error!("Session is not authenticated");
        std::process::exit(1);
    };
    info!("Signed in as {} ({})", user.email, user.id);

    let channel = match Url::parse(config.beasybox_api())
        .map_err(|e| e.to_string())
        .and_then(|origin| Channel::new(&origin, services.store.clone()).map_err(|e| e.to_string()))
    {
        Ok(channel) => channel,
        Err(e) => {
            error!("Invalid realtime origin {}: {e}", config.beasybox_api());
            std::process::exit(1);
        }
    };

    if let Err(e) = channel.connect() {
        error!("Failed to connect realtime channel: {e}");
        std::process::exit(1);
    }

    for name in ServerEvent::NAMES {
        channel.on(name, move |data| {
            if let Some(event) = ServerEvent::parse(name, data) {
                info!("{}: {}", event.event_name(), event.data());
            }
        });
    }
    channel.emit_event(&ClientEvent::JoinMeeting {
        user_id: user.id.clone(),
    });

    let mut route = routes.subscribe();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        _ = route.wait_for(|path| path == config.login_path()) => {
            warn!("Session could not be renewed, log in again");
        }
    }

    channel.emit_event(&ClientEvent::LeaveMeeting { user_id: user.id });
    channel.disconnect().await;
    session.logout().await;
}
