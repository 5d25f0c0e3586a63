use serde::Deserialize;
use serde::Serialize;
use skr_core::UnitId;
use skr_core::UserId;
use skr_core::WeaponId;
use skr_world::Position;

/// A game action submitted for the current turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionInput {
    Move {
        unit_id: UnitId,
        path: Vec<Position>,
    },
    Attack {
        unit_id: UnitId,
        target_id: UnitId,
    },
    CollectLoot {
        unit_id: UnitId,
        loot_drop_id: String,
    },
    EndTurn {
        unit_id: UnitId,
    },
    BuyWeapon {
        user_id: UserId,
        weapon_id: WeaponId,
    },
    Sleep {
        unit_id: UnitId,
    },
}

impl ActionInput {
    /// The unit the action claims to act with, where one is named.
    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            Self::Move { unit_id, .. }
            | Self::Attack { unit_id, .. }
            | Self::CollectLoot { unit_id, .. }
            | Self::EndTurn { unit_id }
            | Self::Sleep { unit_id } => Some(unit_id),
            Self::BuyWeapon { .. } => None,
        }
    }
}

impl std::fmt::Display for ActionInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Move { unit_id, path } => write!(f, "move {} ({} steps)", unit_id, path.len().saturating_sub(1)),
            Self::Attack { unit_id, target_id } => write!(f, "attack {} -> {}", unit_id, target_id),
            Self::CollectLoot { unit_id, loot_drop_id } => write!(f, "collect {} <- {}", unit_id, loot_drop_id),
            Self::EndTurn { unit_id } => write!(f, "end turn {}", unit_id),
            Self::BuyWeapon { user_id, weapon_id } => write!(f, "buy {} for {}", weapon_id, user_id),
            Self::Sleep { unit_id } => write!(f, "sleep {}", unit_id),
        }
    }
}

/// Reason a player's membership ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    Voluntary,
    DisconnectTimeout,
}

/// Membership and phase control handled by the session state machine
/// rather than submitted by clients as game actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Join { user: UserId },
    Disconnect { user: UserId },
    Reconnect { user: UserId },
    Leave { user: UserId, reason: LeaveReason },
    StartCombat,
    Abort,
}
