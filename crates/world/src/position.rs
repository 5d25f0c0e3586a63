use serde::Deserialize;
use serde::Serialize;

/// A point on the unbounded 2D lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
    /// Chebyshev distance: the move count between two tiles when
    /// diagonal steps cost the same as cardinal ones.
    pub fn chebyshev(&self, other: &Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }
    /// True when `other` is one 8-connected step away (or equal).
    pub fn adjacent(&self, other: &Self) -> bool {
        self.chebyshev(other) <= 1
    }
    /// The eight neighbors in fixed clockwise order starting north.
    /// Order is part of the determinism contract for search tie-breaks.
    pub fn neighbors(&self) -> [Self; 8] {
        let Self { x, y } = *self;
        [
            Self::new(x, y - 1),
            Self::new(x + 1, y - 1),
            Self::new(x + 1, y),
            Self::new(x + 1, y + 1),
            Self::new(x, y + 1),
            Self::new(x - 1, y + 1),
            Self::new(x - 1, y),
            Self::new(x - 1, y - 1),
        ]
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
