use super::Weapon;
use serde::Deserialize;
use serde::Serialize;
use skr_core::Gold;
use skr_world::Position;

/// One item inside a loot drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LootItem {
    Gold { name: String, value: Gold },
    Silver { name: String, value: Gold },
    Weapon { weapon: Weapon },
}

/// Items lying on the map where a monster fell, until collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LootDrop {
    pub id: String,
    pub position: Position,
    pub items: Vec<LootItem>,
}

impl std::fmt::Display for LootDrop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} items @ {})", self.id, self.items.len(), self.position)
    }
}
