use serde::Deserialize;
use serde::Serialize;
use skr_core::Points;
use skr_core::UnitId;

/// Lifecycle of a session's combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    NotStarted,
    InProgress,
    Ended,
}

/// Terminal outcome of a combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndResult {
    Victory,
    Defeat,
    Aborted,
}

/// Per-turn budget of the acting unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    pub unit_id: UnitId,
    pub movement_remaining: Points,
    pub has_attacked: bool,
}

/// Initiative order and turn bookkeeping.
///
/// `initiative_order` is sorted by descending initiative, ties broken by
/// ascending unit id. Defeated units remain listed; their turns are
/// skipped. While `phase == InProgress`, `current_turn_index` always
/// indexes into `initiative_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatState {
    pub phase: CombatPhase,
    pub round: u32,
    pub initiative_order: Vec<UnitId>,
    pub current_turn_index: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub turn: Option<TurnState>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_result: Option<EndResult>,
}

impl Default for CombatState {
    fn default() -> Self {
        Self {
            phase: CombatPhase::NotStarted,
            round: 0,
            initiative_order: Vec::new(),
            current_turn_index: 0,
            turn: None,
            end_result: None,
        }
    }
}

impl CombatState {
    /// The unit whose turn it is, when combat is running.
    pub fn turn_holder(&self) -> Option<&UnitId> {
        self.turn.as_ref().map(|t| &t.unit_id)
    }
    pub fn in_progress(&self) -> bool {
        self.phase == CombatPhase::InProgress
    }
}

/// Sort unit ids into initiative order: descending initiative, ascending
/// id on ties. The tiebreak is deterministic by contract — no dice.
pub fn initiative_order<'a, I>(units: I) -> Vec<UnitId>
where
    I: Iterator<Item = (&'a UnitId, Points)>,
{
    let mut order: Vec<(UnitId, Points)> = units.map(|(id, i)| (id.clone(), i)).collect();
    order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    order.into_iter().map(|(id, _)| id).collect()
}
