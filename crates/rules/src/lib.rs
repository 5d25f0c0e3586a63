//! Authoritative combat rules for skirmish.
//!
//! The functional core of the server: a serializable [`Session`] state
//! record and pure transitions over it. [`engine::apply`] validates and
//! executes game actions; [`engine::transition`] handles membership and
//! phase control. Neither ever partially mutates state — both return a
//! fresh `Session` plus the [`Event`]s it emitted, or a [`RuleViolation`]
//! leaving the input untouched.
//!
//! ## Modules
//!
//! - [`Unit`], [`Stats`], [`Team`] — combatants
//! - [`Inventory`], [`Weapon`], [`LootDrop`] — economy
//! - [`CombatState`], [`TurnState`] — initiative and turn bookkeeping
//! - [`Event`] — the append-only, replayable event stream
//! - [`SessionRng`] — seeded, fork-per-decision randomness
//! - [`engine`] — validation and execution
//! - [`replay`] — rebuilding state from a recorded history

mod action;
mod combat;
mod config;
mod event;
pub mod engine;
mod inventory;
mod loot;
pub mod replay;
mod rng;
mod state;
mod unit;
mod violation;

pub use action::*;
pub use combat::*;
pub use config::*;
pub use event::*;
pub use inventory::*;
pub use loot::*;
pub use rng::*;
pub use state::*;
pub use unit::*;
pub use violation::*;
