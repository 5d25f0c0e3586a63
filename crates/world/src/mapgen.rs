use super::Position;
use super::Tile;
use super::TileKind;
use skr_core::SPAWN_CLEARING;
use skr_core::WALL_DENSITY;

/// Deterministic tile source for an unbounded map.
///
/// Every tile is derived from (seed, x, y) through a stable hash; identical
/// inputs always yield identical tiles and no tile is ever stored. The
/// function is total — any coordinate, however far from the origin, has a
/// tile.
#[derive(Debug, Clone, Copy)]
pub struct MapGen {
    seed: u64,
    wall_density: f64,
    shop: Position,
}

impl MapGen {
    pub fn new(seed: u64, wall_density: f64, shop: Position) -> Self {
        Self {
            seed,
            wall_density,
            shop,
        }
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
    /// The fixed shop offset for this session.
    pub fn shop(&self) -> Position {
        self.shop
    }
    /// Generate the tile at `p`. Pure; no I/O.
    pub fn tile(&self, p: Position) -> Tile {
        if p == self.shop {
            return Tile::new(TileKind::Shop);
        }
        // Spawns ring the origin; keep that neighborhood open.
        if p.chebyshev(&Position::ORIGIN) <= SPAWN_CLEARING as u32 {
            return Tile::new(TileKind::Floor);
        }
        // Water covers a quarter of the wall band; both vanish at density 0.
        let roll = self.unit_interval(p);
        if roll < self.wall_density {
            Tile::new(TileKind::Wall)
        } else if roll < self.wall_density * 1.25 {
            Tile::new(TileKind::Water)
        } else {
            Tile::new(TileKind::Floor)
        }
    }
    pub fn walkable(&self, p: Position) -> bool {
        self.tile(p).walkable()
    }
    /// Stable hash of (seed, x, y) mapped onto [0, 1).
    fn unit_interval(&self, p: Position) -> f64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hash;
        use std::hash::Hasher;
        let ref mut hasher = DefaultHasher::new();
        self.seed.hash(hasher);
        p.x.hash(hasher);
        p.y.hash(hasher);
        hasher.finish() as f64 / u64::MAX as f64
    }
}

impl Default for MapGen {
    fn default() -> Self {
        Self::new(0, WALL_DENSITY, Position::new(4, -4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn tiles_are_deterministic() {
        let r#gen = MapGen::new(42, WALL_DENSITY, Position::new(4, -4));
        for x in -50..50 {
            for y in -50..50 {
                let p = Position::new(x, y);
                assert_eq!(r#gen.tile(p), r#gen.tile(p));
            }
        }
    }
    #[test]
    fn seeds_disagree_somewhere() {
        let a = MapGen::new(1, WALL_DENSITY, Position::new(4, -4));
        let b = MapGen::new(2, WALL_DENSITY, Position::new(4, -4));
        let differs = (-100..100).any(|x| {
            (-100..100).any(|y| a.tile(Position::new(x, y)) != b.tile(Position::new(x, y)))
        });
        assert!(differs);
    }
    #[test]
    fn shop_tile_at_configured_offset() {
        let shop = Position::new(7, 3);
        let r#gen = MapGen::new(9, WALL_DENSITY, shop);
        assert_eq!(r#gen.tile(shop).kind, TileKind::Shop);
        assert!(r#gen.tile(shop).walkable());
    }
    #[test]
    fn spawn_clearing_is_open() {
        let r#gen = MapGen::new(1337, WALL_DENSITY, Position::new(40, 40));
        for x in -SPAWN_CLEARING..=SPAWN_CLEARING {
            for y in -SPAWN_CLEARING..=SPAWN_CLEARING {
                assert!(r#gen.walkable(Position::new(x, y)));
            }
        }
    }
    #[test]
    fn wall_density_is_roughly_respected() {
        let r#gen = MapGen::new(7, WALL_DENSITY, Position::new(500, 500));
        let total = 200 * 200;
        let walls = (-100..100)
            .flat_map(|x| (-100..100).map(move |y| Position::new(x, y)))
            .filter(|p| r#gen.tile(*p).kind == TileKind::Wall)
            .count();
        let fraction = walls as f64 / total as f64;
        assert!(fraction > 0.06 && fraction < 0.20, "fraction = {}", fraction);
    }
}
