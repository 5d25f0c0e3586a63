use super::EndResult;
use super::Inventory;
use super::LeaveReason;
use super::LootDrop;
use super::Unit;
use serde::Deserialize;
use serde::Serialize;
use skr_core::Millis;
use skr_core::Points;
use skr_core::UnitId;
use skr_core::UserId;
use skr_world::Position;

/// Events emitted by the rules engine and appended, in order, to a
/// session's turn history. The history is replayable: applying these
/// events to a fresh session with the same seed and roster reconstructs
/// the final state bit for bit, so every variant carries its resolved
/// amounts rather than the dice that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    CombatStarted {
        round: u32,
        initiative_order: Vec<UnitId>,
    },
    TurnStarted {
        unit_id: UnitId,
        round: u32,
    },
    TurnEnded {
        unit_id: UnitId,
    },
    UnitSpawned {
        unit: Unit,
    },
    UnitMoved {
        unit_id: UnitId,
        path: Vec<Position>,
    },
    UnitAttacked {
        attacker_id: UnitId,
        target_id: UnitId,
    },
    UnitDamaged {
        unit_id: UnitId,
        damage: Points,
        remaining_hp: Points,
    },
    UnitDefeated {
        unit_id: UnitId,
    },
    UnitHealed {
        unit_id: UnitId,
        amount: Points,
    },
    LootDropped {
        loot_drop: LootDrop,
    },
    LootCollected {
        loot_drop_id: String,
        user_id: UserId,
    },
    InventoryChanged {
        user_id: UserId,
        inventory: Inventory,
    },
    CombatEnded {
        result: EndResult,
    },
    PlayerJoined {
        user_id: UserId,
        spectator: bool,
    },
    PlayerDisconnected {
        user_id: UserId,
        grace_period_ms: Millis,
    },
    PlayerReconnected {
        user_id: UserId,
    },
    PlayerLeft {
        user_id: UserId,
        reason: LeaveReason,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CombatStarted { round, initiative_order } => {
                write!(f, "combat started (round {}, {} units)", round, initiative_order.len())
            }
            Self::TurnStarted { unit_id, round } => write!(f, "turn: {} (round {})", unit_id, round),
            Self::TurnEnded { unit_id } => write!(f, "turn over: {}", unit_id),
            Self::UnitSpawned { unit } => write!(f, "spawned {}", unit),
            Self::UnitMoved { unit_id, path } => {
                write!(f, "{} moved {} steps", unit_id, path.len().saturating_sub(1))
            }
            Self::UnitAttacked { attacker_id, target_id } => {
                write!(f, "{} attacked {}", attacker_id, target_id)
            }
            Self::UnitDamaged { unit_id, damage, remaining_hp } => {
                write!(f, "{} took {} ({}hp left)", unit_id, damage, remaining_hp)
            }
            Self::UnitDefeated { unit_id } => write!(f, "{} defeated", unit_id),
            Self::UnitHealed { unit_id, amount } => write!(f, "{} healed {}", unit_id, amount),
            Self::LootDropped { loot_drop } => write!(f, "loot dropped: {}", loot_drop),
            Self::LootCollected { loot_drop_id, user_id } => {
                write!(f, "{} collected by {}", loot_drop_id, user_id)
            }
            Self::InventoryChanged { user_id, inventory } => {
                write!(f, "{} inventory: {}g, {} weapons", user_id, inventory.gold, inventory.weapons.len())
            }
            Self::CombatEnded { result } => write!(f, "combat ended: {:?}", result),
            Self::PlayerJoined { user_id, spectator } => match spectator {
                true => write!(f, "{} joined as spectator", user_id),
                false => write!(f, "{} joined", user_id),
            },
            Self::PlayerDisconnected { user_id, grace_period_ms } => {
                write!(f, "{} disconnected ({}ms grace)", user_id, grace_period_ms)
            }
            Self::PlayerReconnected { user_id } => write!(f, "{} reconnected", user_id),
            Self::PlayerLeft { user_id, .. } => write!(f, "{} left", user_id),
        }
    }
}
