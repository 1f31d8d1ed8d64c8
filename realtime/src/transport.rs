//! Socket.IO sessions the channel runs over.

use async_trait::async_trait;
use futures_util::FutureExt;
use log::*;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload, TransportType};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::error::{error, Error, ErrorKind};

/// What a live session reports back to the channel driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// The server accepted the namespace connect.
    Connected,
    /// The server refused the connect or reported an error.
    Failed(String),
    /// An application event.
    Event { name: String, data: Value },
    /// The session ended, with the reason given by the library.
    Closed(String),
}

/// Opens authenticated sessions to the realtime endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Start a session sending `auth` with the namespace connect.
    ///
    /// Everything the server says is forwarded to `events`.
    async fn connect(
        &self,
        url: &Url,
        auth: Value,
        events: UnboundedSender<Incoming>,
    ) -> Result<Box<dyn Socket>, Error>;
}

#[async_trait]
pub trait Socket: Send + Sync {
    async fn emit(&self, event: &str, data: Value) -> Result<(), Error>;

    async fn disconnect(&self);
}

/// Socket.IO endpoint for an API origin.
///
/// `ws(s)` origins are mapped back to `http(s)`, the scheme the client library
/// expects; the path is always `/socket.io/`.
pub fn endpoint_url(origin: &Url) -> Result<Url, Error> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "http",
        "https" | "wss" => "https",
        other => {
            return Err(error(
                ErrorKind::Connect,
                &format!("unsupported realtime scheme {other}"),
            ))
        }
    };

    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|_| error(ErrorKind::Connect, "cannot switch origin to an http scheme"))?;
    url.set_path("/socket.io/");
    url.set_query(None);
    Ok(url)
}

/// Connector backed by `rust_socketio` over the websocket transport.
///
/// The library's own reconnection is disabled; the channel decides when to
/// open a new session.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketIoConnector;

#[async_trait]
impl Connector for SocketIoConnector {
    async fn connect(
        &self,
        url: &Url,
        auth: Value,
        events: UnboundedSender<Incoming>,
    ) -> Result<Box<dyn Socket>, Error> {
        debug!("Opening Socket.IO session to {url}");

        let on_connect = events.clone();
        let on_error = events.clone();
        let on_close = events.clone();
        let client = ClientBuilder::new(url.as_str())
            .transport_type(TransportType::Websocket)
            .auth(auth)
            .reconnect(false)
            .on(Event::Connect, move |_, _| {
                let _ = on_connect.send(Incoming::Connected);
                async {}.boxed()
            })
            .on(Event::Error, move |payload, _| {
                let _ = on_error.send(Incoming::Failed(describe(payload)));
                async {}.boxed()
            })
            .on(Event::Close, move |payload, _| {
                let _ = on_close.send(Incoming::Closed(describe(payload)));
                async {}.boxed()
            })
            .on_any(move |event, payload, _| {
                let name = match event {
                    Event::Custom(name) => Some(name),
                    Event::Message => Some("message".to_string()),
                    _ => None,
                };
                if let Some(name) = name {
                    match into_data(payload) {
                        Some(data) => {
                            let _ = events.send(Incoming::Event { name, data });
                        }
                        None => warn!("Ignoring binary payload for {name}"),
                    }
                }
                async {}.boxed()
            })
            .connect()
            .await
            .map_err(|e| error(ErrorKind::Connect, &e.to_string()))?;

        Ok(Box::new(SocketIoSocket { client }))
    }
}

struct SocketIoSocket {
    client: Client,
}

#[async_trait]
impl Socket for SocketIoSocket {
    async fn emit(&self, event: &str, data: Value) -> Result<(), Error> {
        self.client
            .emit(event, Payload::Text(vec![data]))
            .await
            .map_err(|e| error(ErrorKind::Closed, &e.to_string()))
    }

    async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Socket.IO disconnect failed: {e}");
        }
    }
}

/// Event arguments as one JSON value: the sole argument, or an array of all of them.
fn into_data(payload: Payload) -> Option<Value> {
    match payload {
        Payload::Text(mut args) => Some(match args.len() {
            0 => Value::Null,
            1 => args.remove(0),
            _ => Value::Array(args),
        }),
        _ => None,
    }
}

fn describe(payload: Payload) -> String {
    match into_data(payload) {
        Some(Value::String(reason)) => reason,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
