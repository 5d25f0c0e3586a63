//! World model for skirmish: an unbounded procedurally generated grid,
//! team-aware passability, and deterministic pathfinding.
//!
//! ## Modules
//!
//! - [`Position`] — integer lattice coordinates with Chebyshev metric
//! - [`Tile`] / [`MapGen`] — pure seeded tile generation
//! - [`Passability`] — unit-derived blocker sets for path queries
//! - [`find_path`] / [`reachable`] — A* and bounded BFS

mod mapgen;
mod path;
mod position;
mod tile;

pub use mapgen::*;
pub use path::*;
pub use position::*;
pub use tile::*;
