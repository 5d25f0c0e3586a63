//! Core type aliases, traits, and constants for the skirmish server.
//!
//! This crate provides the foundational types and configuration parameters
//! used throughout the skirmish workspace.

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Canonical user identity (the `sub` claim of a verified token).
pub type UserId = String;
/// Stable unit identifier within a session (e.g. "P1", "M3").
pub type UnitId = String;
/// Stable weapon identifier within the shop catalog and inventories.
pub type WeaponId = String;
/// Save slot identifier.
pub type Slot = String;
/// Hit points, damage amounts, and stat values.
pub type Points = u32;
/// Gold and prices.
pub type Gold = u32;
/// Wire message sequence number, strictly increasing per sender.
pub type Seq = u64;
/// Wall-clock timestamps and durations in milliseconds.
pub type Millis = u64;

// ============================================================================
// TRAITS
// ============================================================================
/// Implemented by entities addressed through an [`ID`].
pub trait Unique<T = Self> {
    fn id(&self) -> ID<T>;
}

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::marker::PhantomData;

/// A v7 uuid tagged with the entity it names.
///
/// The tag exists only at the type level, so a session id can never be
/// handed to something expecting a connection id. Tagging through
/// `fn() -> T` keeps the handle `Send`/`Sync`/`'static` no matter what
/// `T` is.
pub struct ID<T> {
    uuid: uuid::Uuid,
    tag: PhantomData<fn() -> T>,
}

impl<T> ID<T> {
    /// Mint a fresh (time-ordered) identifier.
    pub fn fresh() -> Self {
        Self::from(uuid::Uuid::now_v7())
    }
    pub fn uuid(&self) -> uuid::Uuid {
        self.uuid
    }
    /// Re-tag the same uuid as naming a different entity type.
    pub fn retag<U>(self) -> ID<U> {
        ID::from(self.uuid)
    }
}

impl<T> From<uuid::Uuid> for ID<T> {
    fn from(uuid: uuid::Uuid) -> Self {
        Self {
            uuid,
            tag: PhantomData,
        }
    }
}
impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.uuid
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self::fresh()
    }
}

// The derives would demand T: Clone/Eq/..., which the tag never needs,
// so the usual suspects are spelled out against the uuid alone.
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}
impl<T> Eq for ID<T> {}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.uuid.cmp(&other.uuid)
    }
}
impl<T> std::hash::Hash for ID<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl<T> std::fmt::Debug for ID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ID({})", self.uuid)
    }
}
impl<T> std::fmt::Display for ID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.uuid, f)
    }
}

impl<T> serde::Serialize for ID<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.uuid.serialize(serializer)
    }
}
impl<'de, T> serde::Deserialize<'de> for ID<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        uuid::Uuid::deserialize(deserializer).map(Self::from)
    }
}

// ============================================================================
// COMBAT RULES
// ============================================================================
/// Probability that an attack lands a critical hit (damage doubled).
pub const CRIT_CHANCE: f64 = 0.10;
/// Minimum damage dealt by any successful attack.
pub const MIN_DAMAGE: Points = 1;
/// Wall-clock budget for a player-controlled turn.
pub const TURN_DEADLINE: std::time::Duration = std::time::Duration::from_millis(15_000);
/// Nominal pacing between monster actions in sequential mode.
pub const AI_PACING_SEQUENTIAL: std::time::Duration = std::time::Duration::from_millis(500);
/// Minimal pacing between monster actions in parallel mode.
pub const AI_PACING_PARALLEL: std::time::Duration = std::time::Duration::from_millis(150);

// ============================================================================
// MAP GENERATION
// ============================================================================
/// Fraction of tiles generated as walls.
pub const WALL_DENSITY: f64 = 0.12;
/// Radius around the origin guaranteed to be open floor.
pub const SPAWN_CLEARING: i32 = 2;

// ============================================================================
// PATHFINDING
// ============================================================================
/// A* node expansion cap; searches past this report no path.
pub const PATH_ITERATION_CAP: usize = 10_000;

// ============================================================================
// CONNECTION LIFECYCLE
// ============================================================================
/// Budget for the client to authenticate after opening a connection.
pub const AUTH_DEADLINE: std::time::Duration = std::time::Duration::from_millis(5_000);
/// Window after a disconnect during which session membership is preserved.
pub const GRACE_PERIOD: std::time::Duration = std::time::Duration::from_millis(30_000);
/// Sliding window over which message rates are measured.
pub const RATE_WINDOW: std::time::Duration = std::time::Duration::from_millis(60_000);
/// Game actions allowed per connection per window.
pub const RATE_LIMIT_ACTION: usize = 30;
/// Chat messages allowed per connection per window.
pub const RATE_LIMIT_CHAT: usize = 20;
/// Longest accepted chat message, in characters.
pub const CHAT_MAX_CHARS: usize = 500;

// ============================================================================
// WEBSOCKET CLOSE CODES
// ============================================================================
/// Authentication deadline missed.
pub const CLOSE_AUTH_TIMEOUT: u16 = 4001;
/// Token verification failed.
pub const CLOSE_AUTH_FAILED: u16 = 4002;
/// Connection replaced by a newer one from the same user.
pub const CLOSE_REPLACED: u16 = 4003;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Milliseconds since the unix epoch; used for wire `ts` fields and
/// save-slot metadata, never for game-rule randomness.
pub fn now_ms() -> Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves forward")
        .as_millis() as Millis
}

/// Set up the process logger: INFO on the terminal, DEBUG into a
/// per-run file under `logs/`.
#[cfg(feature = "server")]
pub fn log() {
    use simplelog::*;
    let config = ConfigBuilder::new()
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .set_location_level(log::LevelFilter::Off)
        .build();
    std::fs::create_dir_all("logs").expect("logs directory");
    let path = format!("logs/server-{}.log", now_ms() / 1000);
    let file = std::fs::File::create(&path).expect("log file");
    CombinedLogger::init(vec![
        TermLogger::new(
            log::LevelFilter::Info,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(log::LevelFilter::Debug, config, file),
    ])
    .expect("logger");
}

/// Exit on ctrl-c without waiting for in-flight work.
#[cfg(feature = "server")]
pub fn trap() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("ctrl-c: shutting down now");
            std::process::exit(0);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    struct Marker;
    #[test]
    fn id_roundtrips_through_uuid() {
        let id = ID::<Marker>::fresh();
        let uuid: uuid::Uuid = id.into();
        assert_eq!(ID::<Marker>::from(uuid), id);
    }
    #[test]
    fn retag_preserves_the_uuid() {
        let id = ID::<Marker>::fresh();
        assert_eq!(id.retag::<()>().uuid(), id.uuid());
    }
    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(ID::<Marker>::fresh(), ID::<Marker>::fresh());
    }
    #[test]
    fn default_is_fresh() {
        assert_ne!(ID::<Marker>::default(), ID::<Marker>::default());
    }
}
