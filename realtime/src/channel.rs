//! The process-wide realtime channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use session::token::TokenStore;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use url::Url;

use crate::error::{error, Error, ErrorKind};
use crate::handlers::{Handler, HandlerRegistry};
use crate::message::{ClientEvent, EventName};
use crate::transport::{endpoint_url, Connector, Incoming, Socket, SocketIoConnector};

/// Pseudo-event dispatched once the server accepts the connection.
pub const CONNECT_EVENT: &str = "connect";
/// Pseudo-event dispatched with the reason whenever a live connection ends.
pub const DISCONNECT_EVENT: &str = "disconnect";

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

enum Command {
    Emit(String, Value),
    Disconnect,
}

/// Handle of the running connection driver.
struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<()>,
}

struct Inner {
    url: Url,
    store: Arc<TokenStore>,
    connector: Arc<dyn Connector>,
    handlers: HandlerRegistry,
    connection: Mutex<Option<Connection>>,
    state: watch::Sender<ChannelState>,
}

/// Single duplex event channel shared by every feature of the application.
///
/// Cloning is cheap and every clone drives the same connection. The channel
/// authenticates with the token held by the store when it connects, and again
/// whenever the store receives a renewed token while connected.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Channel to the realtime endpoint of the API `origin`, over Socket.IO.
    pub fn new(origin: &Url, store: Arc<TokenStore>) -> Result<Self, Error> {
        Self::with_connector(origin, store, Arc::new(SocketIoConnector))
    }

    pub fn with_connector(
        origin: &Url,
        store: Arc<TokenStore>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, Error> {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Ok(Self {
            inner: Arc::new(Inner {
                url: endpoint_url(origin)?,
                store,
                connector,
                handlers: HandlerRegistry::new(),
                connection: Mutex::new(None),
                state,
            }),
        })
    }

    /// Open the connection unless one is already open or opening.
    ///
    /// Returns immediately; progress is observable through [`Channel::state`].
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) -> Result<(), Error> {
        let mut connection = self.inner.lock_connection();
        if connection.as_ref().is_some_and(|c| !c.driver.is_finished()) {
            debug!("Realtime channel already connected");
            return Ok(());
        }

        // Subscribe before reading so a renewal racing this call is not missed.
        let mut tokens = self.inner.store.subscribe();
        let Some(token) = tokens.borrow_and_update().clone() else {
            error!("Cannot connect realtime channel: no access token available");
            return Err(error(ErrorKind::NoCredential, "no access token available"));
        };

        let (commands, rx) = mpsc::unbounded_channel();
        self.inner.state.send_replace(ChannelState::Connecting);
        let driver = tokio::spawn(drive(self.inner.clone(), rx, tokens, token));
        *connection = Some(Connection { commands, driver });
        Ok(())
    }

    /// Fire-and-forget send. Without a connection the event is dropped with a warning.
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, data: &T) {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to serialize {event} payload: {e}");
                return;
            }
        };
        self.send(event, data);
    }

    pub fn emit_event(&self, event: &ClientEvent) {
        match event.data() {
            Ok(data) => self.send(event.event_name(), data),
            Err(e) => error!("Failed to serialize {} payload: {e}", event.event_name()),
        }
    }

    /// Register the handler for `event`, replacing any previous one.
    ///
    /// Ignored with a warning before [`Channel::connect`].
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        if self.inner.lock_connection().is_none() {
            warn!("Realtime channel not initialized, ignoring handler for {event}. Call connect() first.");
            return;
        }
        let handler: Handler = Arc::new(handler);
        self.inner.handlers.insert(event, handler);
    }

    pub fn off(&self, event: &str) {
        self.inner.handlers.remove(event);
    }

    /// Tear down the connection and drop every handler.
    pub async fn disconnect(&self) {
        let connection = self.inner.lock_connection().take();
        self.inner.handlers.clear();

        let Some(Connection { commands, driver }) = connection else {
            return;
        };
        let _ = commands.send(Command::Disconnect);
        drop(commands);

        if timeout(HANDSHAKE_TIMEOUT, driver).await.is_err() {
            warn!("Realtime driver did not stop in time");
        }
        self.inner.state.send_replace(ChannelState::Disconnected);
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    fn send(&self, event: &str, data: Value) {
        let connection = self.inner.lock_connection();
        let Some(connection) = connection.as_ref() else {
            warn!("Realtime channel not initialized, dropping {event}. Call connect() first.");
            return;
        };

        if connection
            .commands
            .send(Command::Emit(event.to_string(), data))
            .is_err()
        {
            warn!("Realtime channel closed, dropping {event}");
        }
    }
}

impl Inner {
    fn lock_connection(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publishes `Disconnected` when the driver ends, however it ends.
struct Running<'a>(&'a Inner);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.state.send_replace(ChannelState::Disconnected);
    }
}

/// Why a session ended.
enum Exit {
    Renewed(SecretString),
    Cleared,
    Requested,
    Refused(String),
    Lost(String),
}

impl Exit {
    fn reason(&self) -> &str {
        match self {
            Exit::Renewed(_) => "credential renewed",
            Exit::Cleared => "credential cleared",
            Exit::Requested => "client disconnect",
            Exit::Refused(reason) | Exit::Lost(reason) => reason,
        }
    }
}

/// Connection driver: opens a session, pumps it, and opens a new one on renewal.
async fn drive(
    inner: Arc<Inner>,
    mut commands: UnboundedReceiver<Command>,
    mut tokens: watch::Receiver<Option<SecretString>>,
    mut token: SecretString,
) {
    let _running = Running(&inner);

    loop {
        inner.state.send_replace(ChannelState::Connecting);

        let (events_tx, mut events) = mpsc::unbounded_channel();
        let auth = json!({ "token": token.expose_secret() });
        let socket = match inner.connector.connect(&inner.url, auth, events_tx).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Realtime connection failed: {e}");
                break;
            }
        };

        let (exit, was_connected) = run_session(
            &inner,
            socket.as_ref(),
            &mut events,
            &mut commands,
            &mut tokens,
            &token,
        )
        .await;
        socket.disconnect().await;

        if was_connected {
            info!("Realtime channel disconnected: {}", exit.reason());
            inner.handlers.dispatch(DISCONNECT_EVENT, json!(exit.reason()));
        } else {
            warn!("Realtime connection failed: {}", exit.reason());
        }

        match exit {
            Exit::Renewed(renewed) => token = renewed,
            Exit::Cleared | Exit::Requested | Exit::Refused(_) | Exit::Lost(_) => break,
        }
    }
}

/// Pump one session until it ends. Also reports whether the server ever accepted it.
async fn run_session(
    inner: &Inner,
    socket: &dyn Socket,
    events: &mut UnboundedReceiver<Incoming>,
    commands: &mut UnboundedReceiver<Command>,
    tokens: &mut watch::Receiver<Option<SecretString>>,
    current: &SecretString,
) -> (Exit, bool) {
    let mut connected = false;
    let accept_deadline = sleep(HANDSHAKE_TIMEOUT);
    tokio::pin!(accept_deadline);

    let exit = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Emit(event, data)) => {
                    if let Err(e) = socket.emit(&event, data).await {
                        break Exit::Lost(format!("send failed: {e}"));
                    }
                }
                Some(Command::Disconnect) | None => break Exit::Requested,
            },
            incoming = events.recv() => match incoming {
                Some(Incoming::Connected) => {
                    if !connected {
                        connected = true;
                        info!("Realtime channel connected");
                        inner.state.send_replace(ChannelState::Connected);
                        inner.handlers.dispatch(CONNECT_EVENT, Value::Null);
                    }
                }
                Some(Incoming::Failed(reason)) if !connected => {
                    break Exit::Refused(format!("connection refused: {reason}"));
                }
                Some(Incoming::Failed(reason)) => warn!("Realtime channel error: {reason}"),
                Some(Incoming::Event { name, data }) => {
                    inner.handlers.dispatch(&name, data);
                }
                Some(Incoming::Closed(reason)) if reason.is_empty() => {
                    break Exit::Lost("transport closed".to_string());
                }
                Some(Incoming::Closed(reason)) => break Exit::Lost(reason),
                None => break Exit::Lost("transport closed".to_string()),
            },
            changed = tokens.changed() => {
                if changed.is_err() {
                    break Exit::Cleared;
                }
                let next = tokens.borrow_and_update().clone();
                match next {
                    Some(next) if next.expose_secret() != current.expose_secret() => {
                        break Exit::Renewed(next);
                    }
                    Some(_) => {}
                    None => break Exit::Cleared,
                }
            },
            _ = &mut accept_deadline, if !connected => {
                break Exit::Refused("handshake timed out".to_string());
            }
        }
    };

    (exit, connected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{MemoryConnector, Sent, ServerSide};
    use std::sync::Mutex as StdMutex;

    struct Fixture {
        channel: Channel,
        store: Arc<TokenStore>,
        incoming: UnboundedReceiver<ServerSide>,
    }

    fn fixture(token: Option<&str>) -> Fixture {
        let store = Arc::new(TokenStore::new());
        store.set(token.map(|t| SecretString::from(t.to_string())));
        let (connector, incoming) = MemoryConnector::new();
        let origin = Url::parse("http://localhost:3000").unwrap();
        let channel = Channel::with_connector(&origin, store.clone(), Arc::new(connector)).unwrap();
        Fixture {
            channel,
            store,
            incoming,
        }
    }

    async fn accept(incoming: &mut UnboundedReceiver<ServerSide>) -> ServerSide {
        timeout(Duration::from_secs(5), incoming.recv())
            .await
            .expect("no connection attempt")
            .expect("connector dropped")
    }

    async fn wait_for_state(channel: &Channel, wanted: ChannelState) {
        let mut states = channel.subscribe_state();
        timeout(Duration::from_secs(5), states.wait_for(|state| *state == wanted))
            .await
            .expect("state never reached")
            .unwrap();
    }

    type Log = Arc<StdMutex<Vec<(String, Value)>>>;

    /// Handler that records `(label, payload)` pairs in arrival order.
    fn recorder(log: &Log, label: &str) -> impl Fn(Value) + Send + Sync + 'static {
        let log = log.clone();
        let label = label.to_string();
        move |data| log.lock().unwrap().push((label.clone(), data))
    }

    /// Wait until the server-sent `marker` event has been dispatched.
    async fn wait_for_marker(log: &Log) {
        let wait = async {
            while !log.lock().unwrap().iter().any(|(name, _)| name == "marker") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        timeout(Duration::from_secs(5), wait).await.expect("marker never dispatched");
    }

    async fn connected(token: &str) -> (Fixture, ServerSide) {
        let mut fx = fixture(Some(token));
        fx.channel.connect().unwrap();
        let server = accept(&mut fx.incoming).await;
        server.accept();
        wait_for_state(&fx.channel, ChannelState::Connected).await;
        (fx, server)
    }

    #[tokio::test]
    async fn test_connect_without_token_fails() {
        let fx = fixture(None);

        let err = fx.channel.connect().unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::NoCredential);
        assert_eq!(fx.channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_authenticates_with_stored_token() {
        let mut fx = fixture(Some("t1"));
        fx.channel.connect().unwrap();

        let server = accept(&mut fx.incoming).await;
        assert_eq!(server.url.as_str(), "http://localhost:3000/socket.io/");
        assert_eq!(server.auth, json!({ "token": "t1" }));
        assert_eq!(fx.channel.state(), ChannelState::Connecting);

        server.accept();
        wait_for_state(&fx.channel, ChannelState::Connected).await;
    }

    #[tokio::test]
    async fn test_connect_twice_keeps_one_connection() {
        let (mut fx, _server) = connected("t1").await;

        fx.channel.connect().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(fx.incoming.try_recv().is_err());
        assert!(fx.channel.is_connected());
    }

    #[tokio::test]
    async fn test_emit_before_connect_is_dropped() {
        let mut fx = fixture(Some("t1"));

        fx.channel.emit("joinChat", &json!({ "chatId": "c1" }));

        assert!(fx.incoming.try_recv().is_err());
        assert_eq!(fx.channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_emit_sends_event() {
        let (fx, mut server) = connected("t1").await;

        fx.channel.emit_event(&ClientEvent::JoinChat {
            chat_id: "c1".to_string(),
            user_id: "u1".to_string(),
        });

        assert_eq!(
            server.recv().await,
            Some(Sent::Emit(
                "joinChat".to_string(),
                json!({ "chatId": "c1", "userId": "u1" })
            ))
        );
    }

    #[tokio::test]
    async fn test_connect_event_is_dispatched() {
        let mut fx = fixture(Some("t1"));
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        fx.channel.connect().unwrap();
        fx.channel.on(CONNECT_EVENT, recorder(&log, CONNECT_EVENT));
        fx.channel.on("marker", recorder(&log, "marker"));

        let server = accept(&mut fx.incoming).await;
        server.accept();
        server.send("marker", Value::Null);
        wait_for_marker(&log).await;

        assert_eq!(log.lock().unwrap()[0], (CONNECT_EVENT.to_string(), Value::Null));
    }

    #[tokio::test]
    async fn test_on_replaces_previous_handler() {
        let (fx, server) = connected("t1").await;
        let log: Log = Arc::new(StdMutex::new(Vec::new()));

        fx.channel.on("chatResponse", recorder(&log, "first"));
        fx.channel.on("chatResponse", recorder(&log, "second"));
        fx.channel.on("marker", recorder(&log, "marker"));

        server.send("chatResponse", json!({ "text": "Olá" }));
        server.send("marker", Value::Null);
        wait_for_marker(&log).await;

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], ("second".to_string(), json!({ "text": "Olá" })));
    }

    #[tokio::test]
    async fn test_off_deregisters_handler() {
        let (fx, server) = connected("t1").await;
        let log: Log = Arc::new(StdMutex::new(Vec::new()));

        fx.channel.on("meetingCreated", recorder(&log, "meetingCreated"));
        fx.channel.on("marker", recorder(&log, "marker"));
        fx.channel.off("meetingCreated");

        server.send("meetingCreated", json!({ "id": "m1" }));
        server.send("marker", Value::Null);
        wait_for_marker(&log).await;

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_on_before_connect_is_ignored() {
        let mut fx = fixture(Some("t1"));
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        fx.channel.on("messageCreated", recorder(&log, "early"));

        fx.channel.connect().unwrap();
        let server = accept(&mut fx.incoming).await;
        server.accept();
        wait_for_state(&fx.channel, ChannelState::Connected).await;
        fx.channel.on("marker", recorder(&log, "marker"));

        server.send("messageCreated", json!({}));
        server.send("marker", Value::Null);
        wait_for_marker(&log).await;

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_renewed_token_reconnects_and_keeps_handlers() {
        let (mut fx, mut old_server) = connected("t1").await;
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        fx.channel.on("marker", recorder(&log, "marker"));

        fx.store.set(Some(SecretString::from("t2".to_string())));

        assert_eq!(old_server.recv().await, Some(Sent::Disconnect));
        let server = accept(&mut fx.incoming).await;
        assert_eq!(server.auth, json!({ "token": "t2" }));
        server.accept();
        wait_for_state(&fx.channel, ChannelState::Connected).await;

        server.send("marker", Value::Null);
        wait_for_marker(&log).await;
    }

    #[tokio::test]
    async fn test_same_token_does_not_reconnect() {
        let (mut fx, _server) = connected("t1").await;

        fx.store.set(Some(SecretString::from("t1".to_string())));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(fx.incoming.try_recv().is_err());
        assert!(fx.channel.is_connected());
    }

    #[tokio::test]
    async fn test_cleared_token_disconnects() {
        let (fx, mut server) = connected("t1").await;

        fx.store.clear();

        assert_eq!(server.recv().await, Some(Sent::Disconnect));
        wait_for_state(&fx.channel, ChannelState::Disconnected).await;
    }

    #[tokio::test]
    async fn test_refused_connection_ends_disconnected() {
        let mut fx = fixture(Some("stale"));
        fx.channel.connect().unwrap();

        let server = accept(&mut fx.incoming).await;
        server.refuse("Unauthorized");

        wait_for_state(&fx.channel, ChannelState::Disconnected).await;
    }

    #[tokio::test]
    async fn test_server_hang_up_ends_disconnected() {
        let (fx, server) = connected("t1").await;
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        fx.channel.on(DISCONNECT_EVENT, recorder(&log, DISCONNECT_EVENT));

        server.hang_up();

        wait_for_state(&fx.channel, ChannelState::Disconnected).await;
        assert_eq!(
            log.lock().unwrap()[0],
            (DISCONNECT_EVENT.to_string(), json!("transport close"))
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_leaves_channel_disconnected() {
        let (fx, server) = connected("t1").await;
        fx.channel.on("meetingCreated", |_| panic!("handler failed"));

        server.send("meetingCreated", json!({ "id": "m1" }));

        wait_for_state(&fx.channel, ChannelState::Disconnected).await;
        assert!(!fx.channel.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_and_allows_reconnect() {
        let (mut fx, mut server) = connected("t1").await;

        fx.channel.disconnect().await;

        assert_eq!(server.recv().await, Some(Sent::Disconnect));
        assert_eq!(server.recv().await, None);
        assert_eq!(fx.channel.state(), ChannelState::Disconnected);

        fx.channel.emit("joinMeeting", &json!({ "userId": "u1" }));
        assert!(fx.incoming.try_recv().is_err());

        fx.channel.connect().unwrap();
        let server = accept(&mut fx.incoming).await;
        server.accept();
        wait_for_state(&fx.channel, ChannelState::Connected).await;
    }
}
