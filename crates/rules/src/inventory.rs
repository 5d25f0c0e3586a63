use serde::Deserialize;
use serde::Serialize;
use skr_core::Gold;
use skr_core::Points;
use skr_core::WeaponId;

/// A purchasable or lootable weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub id: WeaponId,
    pub name: String,
    pub attack_bonus: Points,
    pub price: Gold,
}

/// Per-player holdings. `equipped`, when set, references a weapon in
/// `weapons`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub gold: Gold,
    pub weapons: Vec<Weapon>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub equipped: Option<WeaponId>,
}

impl Inventory {
    pub fn with_gold(gold: Gold) -> Self {
        Self {
            gold,
            ..Self::default()
        }
    }
    pub fn owns(&self, id: &WeaponId) -> bool {
        self.weapons.iter().any(|w| &w.id == id)
    }
    /// Attack bonus granted by the equipped weapon, zero when bare-handed.
    pub fn equipped_bonus(&self) -> Points {
        self.equipped
            .as_ref()
            .and_then(|id| self.weapons.iter().find(|w| &w.id == id))
            .map(|w| w.attack_bonus)
            .unwrap_or(0)
    }
    /// Add a weapon, equipping it when it strictly beats the current one.
    pub fn acquire(&mut self, weapon: Weapon) {
        let better = weapon.attack_bonus > self.equipped_bonus() || self.equipped.is_none();
        let id = weapon.id.clone();
        self.weapons.push(weapon);
        if better {
            self.equipped = Some(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword(id: &str, bonus: Points) -> Weapon {
        Weapon {
            id: id.to_string(),
            name: format!("sword {}", id),
            attack_bonus: bonus,
            price: 10,
        }
    }

    #[test]
    fn bare_hands_grant_nothing() {
        assert_eq!(Inventory::default().equipped_bonus(), 0);
    }
    #[test]
    fn first_weapon_is_equipped() {
        let mut inv = Inventory::default();
        inv.acquire(sword("a", 0));
        assert_eq!(inv.equipped.as_deref(), Some("a"));
    }
    #[test]
    fn better_weapon_takes_over() {
        let mut inv = Inventory::default();
        inv.acquire(sword("a", 2));
        inv.acquire(sword("b", 5));
        assert_eq!(inv.equipped.as_deref(), Some("b"));
        assert_eq!(inv.equipped_bonus(), 5);
    }
    #[test]
    fn worse_weapon_is_carried_not_equipped() {
        let mut inv = Inventory::default();
        inv.acquire(sword("a", 5));
        inv.acquire(sword("b", 2));
        assert_eq!(inv.equipped.as_deref(), Some("a"));
        assert_eq!(inv.weapons.len(), 2);
    }
}
