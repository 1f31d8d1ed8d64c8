//! Realtime channel for chat streaming and meeting lifecycle events.
//!
//! # Architecture
//!
//! - **One connection per process**: a [`Channel`] is constructed once and
//!   cloned into every feature that needs it. `connect` is a no-op while a
//!   connection is open or opening.
//! - **Handlers replace, never stack**: each event name maps to at most one
//!   handler. Features register on mount and call `off` on unmount.
//! - **Authenticated at connect time**: the store's current access token is sent
//!   as the Socket.IO auth payload. When the store receives a renewed token the
//!   channel opens a new session with it; when the token is cleared it disconnects.
//! - **Fire-and-forget emits**: emitting without a connection logs a warning and
//!   drops the event.
//!
//! # Example
//!
//! ```rust,ignore
//! use realtime::{Channel, ClientEvent};
//!
//! let channel = Channel::new(&api_origin, services.store.clone())?;
//! channel.connect()?;
//! channel.on("chatResponse", |chunk| println!("{chunk}"));
//! channel.emit_event(&ClientEvent::JoinChat { chat_id, user_id });
//! ```
//!
//! # Modules
//!
//! - `channel`: connection lifecycle and the session driver
//! - `handlers`: event name to handler registry
//! - `message`: typed client and server events
//! - `transport`: `rust_socketio` connector and the `Connector` seam

pub mod channel;
pub mod error;
pub mod handlers;
pub mod message;
pub mod transport;

pub use channel::{Channel, ChannelState, CONNECT_EVENT, DISCONNECT_EVENT};
pub use error::{Error, ErrorKind};
pub use message::{ClientEvent, EventName, ServerEvent};
