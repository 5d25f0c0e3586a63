use serde::Deserialize;
use serde::Serialize;

/// Terrain classification of a generated tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Floor,
    Wall,
    Water,
    Shop,
}

/// One generated tile. Tiles are pure functions of (seed, x, y) and are
/// never stored; this struct is the value returned by [`crate::MapGen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
}

impl Tile {
    pub fn new(kind: TileKind) -> Self {
        Self { kind }
    }
    /// Units may occupy floor and shop tiles.
    pub fn walkable(&self) -> bool {
        matches!(self.kind, TileKind::Floor | TileKind::Shop)
    }
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self.kind {
            TileKind::Floor => '.',
            TileKind::Wall => '#',
            TileKind::Water => '~',
            TileKind::Shop => '$',
        };
        write!(f, "{}", c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn walkability_by_kind() {
        assert!(Tile::new(TileKind::Floor).walkable());
        assert!(Tile::new(TileKind::Shop).walkable());
        assert!(!Tile::new(TileKind::Wall).walkable());
        assert!(!Tile::new(TileKind::Water).walkable());
    }
}
