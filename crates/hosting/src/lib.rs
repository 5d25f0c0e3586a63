//! WebSocket session hosting for skirmish.
//!
//! ## Architecture
//!
//! - [`Garrison`] — process-wide registry of session workers,
//!   connections, user bindings, and reconnect grace timers; fans worker
//!   events out to connected members
//! - [`Router`] — per-connection message pipeline: decode, sequence
//!   check, pre-auth whitelist, rate limiting, dispatch
//! - [`bridge`] — the actix-ws task pairing a transport connection with
//!   its router and outbound frame queue
//! - [`Inbound`] / [`Outbound`] — the JSON envelope and typed
//!   client/server messages

mod bridge;
mod connection;
mod garrison;
mod ratelimit;
mod router;
mod wire;

pub use bridge::*;
pub use connection::*;
pub use garrison::*;
pub use ratelimit::*;
pub use router::*;
pub use wire::*;
