use serde::Deserialize;
use serde::Serialize;

/// An action rejected by the rules engine. Violations never mutate state
/// and never close the connection that submitted them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RuleViolation {
    NotYourTurn(String),
    UnitDead(String),
    OutOfRange(String),
    PathInvalid(String),
    Occupied(String),
    AlreadyAttacked(String),
    InsufficientGold(String),
    DuplicateWeapon(String),
    NotAdjacent(String),
    UnknownAction(String),
}

impl RuleViolation {
    /// Machine-readable kind, used as the wire error code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotYourTurn(_) => "not_your_turn",
            Self::UnitDead(_) => "unit_dead",
            Self::OutOfRange(_) => "out_of_range",
            Self::PathInvalid(_) => "path_invalid",
            Self::Occupied(_) => "occupied",
            Self::AlreadyAttacked(_) => "already_attacked",
            Self::InsufficientGold(_) => "insufficient_gold",
            Self::DuplicateWeapon(_) => "duplicate_weapon",
            Self::NotAdjacent(_) => "not_adjacent",
            Self::UnknownAction(_) => "unknown_action",
        }
    }
    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            Self::NotYourTurn(m)
            | Self::UnitDead(m)
            | Self::OutOfRange(m)
            | Self::PathInvalid(m)
            | Self::Occupied(m)
            | Self::AlreadyAttacked(m)
            | Self::InsufficientGold(m)
            | Self::DuplicateWeapon(m)
            | Self::NotAdjacent(m)
            | Self::UnknownAction(m) => m,
        }
    }
}

impl std::fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for RuleViolation {}
