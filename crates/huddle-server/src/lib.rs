//! Huddle signaling server.
//!
//! Coordinates multi-party media sessions: rooms are created over HTTP,
//! participants sign in over a WebSocket and negotiate media through the
//! engine adapter. The server never touches media itself.
//!
//! # Architecture
//!
//! - [`registry::RoomRegistry`] - all room/participant state behind one
//!   async mutex; engine round trips stay outside the lock
//! - [`session::SessionHandler`] - per-connection protocol state machine
//! - [`ws`] - WebSocket read loop + writer task per connection
//! - [`http`] - room management API
//! - [`observability`] - health endpoint and metrics helpers

pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod registry;
pub mod session;
pub mod ws;
