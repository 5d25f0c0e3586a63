use super::CombatState;
use super::Event;
use super::Inventory;
use super::LootDrop;
use super::SessionConfig;
use super::SessionRng;
use super::Team;
use super::Unit;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use skr_core::ID;
use skr_core::Millis;
use skr_core::Unique;
use skr_core::UnitId;
use skr_core::UserId;
use skr_world::MapGen;
use skr_world::Passability;
use skr_world::Position;
use std::collections::BTreeMap;

/// Connection standing of a member within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Presence {
    Connected,
    Disconnected { grace_period_ms: Millis },
    Spectating,
}

/// The authoritative state of one running game.
///
/// Owned exclusively by its session worker; every other component sees
/// this state only through the emitted [`Event`] stream. The whole record
/// serializes for the save store and round-trips bit-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub(crate) id: ID<Session>,
    pub(crate) seed: u64,
    pub(crate) config: SessionConfig,
    pub(crate) units: BTreeMap<UnitId, Unit>,
    pub(crate) loot_drops: BTreeMap<String, LootDrop>,
    pub(crate) combat: CombatState,
    pub(crate) turn_history: Vec<Event>,
    pub(crate) inventories: BTreeMap<UserId, Inventory>,
    pub(crate) members: BTreeMap<UserId, Presence>,
    pub(crate) next_player: u32,
    pub(crate) next_loot: u64,
}

impl Unique for Session {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

impl Session {
    /// Create a fresh session: monsters take their configured or seeded
    /// positions; players spawn later, one unit per joining user.
    pub fn new(id: ID<Session>, seed: u64, config: SessionConfig) -> Self {
        let mut session = Self {
            id,
            seed,
            config,
            units: BTreeMap::new(),
            loot_drops: BTreeMap::new(),
            combat: CombatState::default(),
            turn_history: Vec::new(),
            inventories: BTreeMap::new(),
            members: BTreeMap::new(),
            next_player: 0,
            next_loot: 0,
        };
        session.place_monsters();
        session
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
    pub fn units(&self) -> &BTreeMap<UnitId, Unit> {
        &self.units
    }
    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }
    pub fn loot_drops(&self) -> &BTreeMap<String, LootDrop> {
        &self.loot_drops
    }
    pub fn combat(&self) -> &CombatState {
        &self.combat
    }
    pub fn turn_history(&self) -> &[Event] {
        &self.turn_history
    }
    pub fn inventories(&self) -> &BTreeMap<UserId, Inventory> {
        &self.inventories
    }
    pub fn inventory(&self, user: &UserId) -> Option<&Inventory> {
        self.inventories.get(user)
    }
    pub fn members(&self) -> &BTreeMap<UserId, Presence> {
        &self.members
    }
    pub fn rng(&self) -> SessionRng {
        SessionRng::new(self.seed)
    }
    pub fn mapgen(&self) -> MapGen {
        MapGen::new(self.seed, self.config.wall_density, self.config.shop_offset)
    }

    /// Append an emitted event to the turn history.
    pub fn record(&mut self, event: Event) {
        self.turn_history.push(event);
    }

    /// The unit controlled by `user`, if any survives.
    pub fn unit_owned_by(&self, user: &UserId) -> Option<&Unit> {
        self.units
            .values()
            .find(|u| u.owner.as_ref() == Some(user))
    }

    /// The living unit standing on `p`, excluding `except`.
    pub fn occupant(&self, p: Position, except: Option<&UnitId>) -> Option<&Unit> {
        self.units
            .values()
            .filter(|u| u.alive())
            .filter(|u| Some(&u.id) != except)
            .find(|u| u.position == p)
    }

    /// Blocker sets for a unit moving on `side`: same-side units are
    /// pass-through, opposing units block. Dead units never block.
    pub fn passability(&self, side: Team, mover: &UnitId) -> Passability {
        let mut pass = Passability::new();
        for unit in self.units.values() {
            if &unit.id == mover || !unit.alive() {
                continue;
            }
            if unit.team.hostile_to(&side) {
                pass.block_enemy(unit.position);
            } else {
                pass.block_friendly(unit.position);
            }
        }
        pass
    }

    /// One-line description for save-slot listings.
    pub fn summary(&self) -> String {
        let monsters = self.units.values().filter(|u| u.team == Team::Monster).count();
        let players = self.units.values().filter(|u| u.team != Team::Monster).count();
        format!(
            "round {}, {} player units, {} monsters",
            self.combat.round, players, monsters
        )
    }

    fn place_monsters(&mut self) {
        let r#gen = self.mapgen();
        let rng = self.rng();
        let spawns = self.config.monsters.clone();
        for (i, spawn) in spawns.into_iter().enumerate() {
            let id = format!("M{}", i + 1);
            let position = match spawn.position {
                Some(p) => p,
                None => self.seeded_spawn(&r#gen, &rng, i as u64),
            };
            self.units.insert(
                id.clone(),
                Unit {
                    id,
                    team: Team::Monster,
                    name: spawn.name,
                    position,
                    stats: spawn.stats,
                    owner: None,
                },
            );
        }
    }

    /// Deterministic monster placement: candidate tiles on rings away
    /// from the spawn clearing, chosen by the session dice.
    fn seeded_spawn(&self, r#gen: &MapGen, rng: &SessionRng, i: u64) -> Position {
        let candidates: Vec<Position> = (6..=12)
            .flat_map(ring)
            .filter(|p| r#gen.walkable(*p))
            .filter(|p| self.occupant(*p, None).is_none())
            .collect();
        match candidates.len() {
            0 => Position::new(6 + i as i32, 6),
            n => candidates[rng.at("spawn", i).random_range(0..n)],
        }
    }

    /// First open tile for a joining player, scanning outward from the
    /// origin in fixed order.
    pub(crate) fn player_spawn(&self) -> Position {
        let r#gen = self.mapgen();
        std::iter::once(Position::ORIGIN)
            .chain((1..=5).flat_map(ring))
            .find(|p| r#gen.walkable(*p) && self.occupant(*p, None).is_none())
            .unwrap_or(Position::ORIGIN)
    }
}

/// Perimeter of the Chebyshev square of radius `r`, enumerated in fixed
/// order (top row, right column, bottom row, left column).
fn ring(r: i32) -> Vec<Position> {
    let mut out = Vec::new();
    for x in -r..=r {
        out.push(Position::new(x, -r));
    }
    for y in (-r + 1)..=r {
        out.push(Position::new(r, y));
    }
    for x in (-r..r).rev() {
        out.push(Position::new(x, r));
    }
    for y in ((-r + 1)..r).rev() {
        out.push(Position::new(-r, y));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(ID::default(), 42, SessionConfig::default())
    }

    #[test]
    fn monsters_spawn_on_walkable_tiles() {
        let s = session();
        let r#gen = s.mapgen();
        let monsters: Vec<_> = s.units.values().collect();
        assert_eq!(monsters.len(), 2);
        for m in monsters {
            assert_eq!(m.team, Team::Monster);
            assert!(r#gen.walkable(m.position));
        }
    }

    #[test]
    fn no_two_units_share_a_position() {
        let s = session();
        let positions: Vec<_> = s.units.values().map(|u| u.position).collect();
        let unique: std::collections::BTreeSet<_> = positions.iter().collect();
        assert_eq!(positions.len(), unique.len());
    }

    #[test]
    fn same_seed_same_roster() {
        let a = Session::new(ID::default(), 7, SessionConfig::default());
        let b = Session::new(ID::default(), 7, SessionConfig::default());
        assert_eq!(a.units.values().map(|u| u.position).collect::<Vec<_>>(),
                   b.units.values().map(|u| u.position).collect::<Vec<_>>());
    }

    #[test]
    fn session_roundtrips_through_json() {
        let s = session();
        let json = serde_json::to_string(&s).expect("serialize");
        let back: Session = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(s, back);
    }

    #[test]
    fn ring_has_expected_perimeter() {
        assert_eq!(ring(1).len(), 8);
        assert_eq!(ring(2).len(), 16);
        let r3 = ring(3);
        assert_eq!(r3.len(), 24);
        let unique: std::collections::BTreeSet<_> = r3.iter().collect();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn player_spawn_prefers_origin() {
        let s = session();
        assert_eq!(s.player_spawn(), Position::ORIGIN);
    }
}
