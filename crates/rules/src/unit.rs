use serde::Deserialize;
use serde::Serialize;
use skr_core::Points;
use skr_core::UnitId;
use skr_core::UserId;
use skr_world::Position;

/// Side a unit fights for. `Player` and `Npc` share the player side;
/// `Monster` is the opposing side for pass-through and attack-validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Player,
    Npc,
    Monster,
}

impl Team {
    /// True for units on the player side of the board.
    pub fn is_player_side(&self) -> bool {
        matches!(self, Self::Player | Self::Npc)
    }
    /// Units on opposite sides may attack and block one another.
    pub fn hostile_to(&self, other: &Self) -> bool {
        self.is_player_side() != other.is_player_side()
    }
}

/// Combat statistics. All values non-negative; `hp <= max_hp` at every
/// committed state, and `hp == 0` means the unit is defeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub hp: Points,
    pub max_hp: Points,
    pub attack: Points,
    pub defense: Points,
    pub initiative: Points,
    pub move_range: Points,
    pub attack_range: Points,
}

impl Stats {
    pub fn alive(&self) -> bool {
        self.hp > 0
    }
}

/// One combatant on the map. Created at session start or through a spawn
/// event; mutated only by the rules engine; removed once defeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: UnitId,
    pub team: Team,
    pub name: String,
    pub position: Position,
    pub stats: Stats,
    /// Controlling user for player units; doubles as the inventory key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub owner: Option<UserId>,
}

impl Unit {
    pub fn alive(&self) -> bool {
        self.stats.alive()
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}hp @ {})",
            self.id, self.stats.hp, self.position
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn npc_fights_beside_players() {
        assert!(Team::Npc.is_player_side());
        assert!(Team::Player.is_player_side());
        assert!(!Team::Monster.is_player_side());
    }
    #[test]
    fn hostility_is_across_sides() {
        assert!(Team::Player.hostile_to(&Team::Monster));
        assert!(Team::Monster.hostile_to(&Team::Npc));
        assert!(!Team::Player.hostile_to(&Team::Npc));
        assert!(!Team::Monster.hostile_to(&Team::Monster));
    }
}
