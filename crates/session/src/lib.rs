//! Async runtime for live skirmish sessions.
//!
//! Each session runs as a single-writer actor: every action submission,
//! timer expiry, and membership change is serialized into one queue and
//! processed to completion before the next. Concurrency comes from many
//! sessions, never from threads within one.
//!
//! ## Architecture
//!
//! - [`SessionWorker`] — owns the authoritative [`skr_rules::Session`],
//!   applies actions through the rules engine, appends history, emits
//!   events
//! - [`TurnClock`] — pausable wall-clock deadline driving auto-end-turn
//!   and AI pacing
//! - [`ai`] — the fixed monster heuristic
//! - [`SessionCommand`] / [`Outgoing`] — the worker's inbound and
//!   outbound message types

pub mod ai;
mod clock;
mod command;
mod worker;

pub use clock::*;
pub use command::*;
pub use worker::*;
