use super::MapGen;
use super::Position;
use skr_core::PATH_ITERATION_CAP;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

/// Blocker sets derived from the living units on the map, classified
/// relative to the moving unit's side.
///
/// Friendlies are pass-through but not stop-on; enemies block both.
#[derive(Debug, Clone, Default)]
pub struct Passability {
    friendly: HashSet<Position>,
    enemy: HashSet<Position>,
}

impl Passability {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn block_friendly(&mut self, p: Position) {
        self.friendly.insert(p);
    }
    pub fn block_enemy(&mut self, p: Position) {
        self.enemy.insert(p);
    }
    /// A unit may traverse `p` mid-path.
    pub fn traversable(&self, p: &Position) -> bool {
        !self.enemy.contains(p)
    }
    /// A unit may end its move on `p`.
    pub fn stoppable(&self, p: &Position) -> bool {
        !self.enemy.contains(p) && !self.friendly.contains(p)
    }
}

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    pos: Position,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, Position, u64) {
        (self.f, self.g, self.pos, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for OpenNode {}
impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        other.key().cmp(&self.key())
    }
}

/// A* over the 8-connected grid with uniform step cost and Chebyshev
/// heuristic. Returns the inclusive step sequence from `from` to `to`,
/// or `None` when no path exists within the iteration cap.
///
/// The goal tile itself is treated as walkable for the query, so callers
/// can path up to an occupied or blocked target (adjacent-attack checks,
/// AI approach); stop-validity of the final tile is the caller's rule.
pub fn find_path(
    r#gen: &MapGen,
    from: Position,
    to: Position,
    pass: &Passability,
) -> Option<Vec<Position>> {
    if from == to {
        return Some(vec![from]);
    }
    let mut open = BinaryHeap::new();
    let mut came: HashMap<Position, Position> = HashMap::new();
    let mut best: HashMap<Position, u32> = HashMap::new();
    let mut tie = 0u64;
    best.insert(from, 0);
    open.push(OpenNode {
        f: from.chebyshev(&to),
        g: 0,
        pos: from,
        tie,
    });
    let mut expanded = 0usize;
    while let Some(node) = open.pop() {
        if node.pos == to {
            return Some(unwind(&came, from, to));
        }
        if best.get(&node.pos).copied().unwrap_or(u32::MAX) < node.g {
            continue;
        }
        expanded += 1;
        if expanded > PATH_ITERATION_CAP {
            log::debug!("[path] search exhausted after {} expansions", expanded);
            return None;
        }
        for next in node.pos.neighbors() {
            if next != to && !(r#gen.walkable(next) && pass.traversable(&next)) {
                continue;
            }
            let g = node.g + 1;
            if g < best.get(&next).copied().unwrap_or(u32::MAX) {
                best.insert(next, g);
                came.insert(next, node.pos);
                tie += 1;
                open.push(OpenNode {
                    f: g + next.chebyshev(&to),
                    g,
                    pos: next,
                    tie,
                });
            }
        }
    }
    None
}

fn unwind(came: &HashMap<Position, Position>, from: Position, to: Position) -> Vec<Position> {
    let mut path = vec![to];
    let mut cursor = to;
    while cursor != from {
        cursor = came[&cursor];
        path.push(cursor);
    }
    path.reverse();
    path
}

/// Positions a unit may stop on within `range` steps of `from`, with the
/// step distance to each. BFS; friendly-occupied tiles are traversed but
/// not emitted. `from` is always reachable at distance 0.
pub fn reachable(
    r#gen: &MapGen,
    from: Position,
    range: u32,
    pass: &Passability,
) -> BTreeMap<Position, u32> {
    let mut passed: HashMap<Position, u32> = HashMap::new();
    let mut queue = VecDeque::new();
    passed.insert(from, 0);
    queue.push_back((from, 0u32));
    while let Some((pos, dist)) = queue.pop_front() {
        if dist == range {
            continue;
        }
        for next in pos.neighbors() {
            if passed.contains_key(&next) {
                continue;
            }
            if !(r#gen.walkable(next) && pass.traversable(&next)) {
                continue;
            }
            passed.insert(next, dist + 1);
            queue.push_back((next, dist + 1));
        }
    }
    passed
        .into_iter()
        .filter(|(pos, _)| *pos == from || pass.stoppable(pos))
        .collect()
}
