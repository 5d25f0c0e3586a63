use super::Stats;
use super::Weapon;
use serde::Deserialize;
use serde::Serialize;
use skr_core::Gold;
use skr_core::Points;
use skr_core::WALL_DENSITY;
use skr_world::Position;

/// How consecutive monster turns are paced by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NpcTurnMode {
    /// One monster acts, then a visual delay, then the next.
    #[default]
    Sequential,
    /// Consecutive monster turns resolve back-to-back with minimal pacing.
    Parallel,
}

/// A monster to place at session creation. Position is seeded when
/// omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterSpawn {
    pub name: String,
    pub stats: Stats,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
}

/// Session-level knobs, set at creation from lobby input. The rules
/// engine reads them; nothing mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Player count required before combat auto-starts.
    pub players: usize,
    pub wall_density: f64,
    pub shop_offset: Position,
    /// HP restored by the sleep action.
    pub heal_amount: Points,
    /// Multiplier applied to AI pacing delays.
    pub game_speed: f64,
    pub npc_turn_mode: NpcTurnMode,
    pub starting_gold: Gold,
    pub player_stats: Stats,
    pub monsters: Vec<MonsterSpawn>,
    pub shop_catalog: Vec<Weapon>,
    /// Weapons that may appear in monster loot.
    pub loot_weapons: Vec<Weapon>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            players: 1,
            wall_density: WALL_DENSITY,
            shop_offset: Position::new(4, -4),
            heal_amount: 5,
            game_speed: 1.0,
            npc_turn_mode: NpcTurnMode::default(),
            starting_gold: 50,
            player_stats: Stats {
                hp: 20,
                max_hp: 20,
                attack: 5,
                defense: 1,
                initiative: 10,
                move_range: 5,
                attack_range: 1,
            },
            monsters: vec![
                MonsterSpawn {
                    name: "Skeleton".to_string(),
                    stats: Stats {
                        hp: 10,
                        max_hp: 10,
                        attack: 4,
                        defense: 0,
                        initiative: 8,
                        move_range: 3,
                        attack_range: 1,
                    },
                    position: None,
                },
                MonsterSpawn {
                    name: "Ghoul".to_string(),
                    stats: Stats {
                        hp: 14,
                        max_hp: 14,
                        attack: 5,
                        defense: 1,
                        initiative: 6,
                        move_range: 3,
                        attack_range: 1,
                    },
                    position: None,
                },
            ],
            shop_catalog: vec![
                Weapon {
                    id: "w-dagger".to_string(),
                    name: "Dagger".to_string(),
                    attack_bonus: 1,
                    price: 15,
                },
                Weapon {
                    id: "w-shortsword".to_string(),
                    name: "Short Sword".to_string(),
                    attack_bonus: 3,
                    price: 40,
                },
                Weapon {
                    id: "w-warhammer".to_string(),
                    name: "War Hammer".to_string(),
                    attack_bonus: 5,
                    price: 90,
                },
            ],
            loot_weapons: vec![
                Weapon {
                    id: "w-rusty-blade".to_string(),
                    name: "Rusty Blade".to_string(),
                    attack_bonus: 2,
                    price: 20,
                },
                Weapon {
                    id: "w-cleaver".to_string(),
                    name: "Cleaver".to_string(),
                    attack_bonus: 4,
                    price: 60,
                },
            ],
        }
    }
}
