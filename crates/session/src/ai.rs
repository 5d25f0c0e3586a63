//! The fixed monster heuristic: attack if a valid target is in range;
//! otherwise step toward the closest living enemy; otherwise end the
//! turn. Not pluggable.

use skr_core::UnitId;
use skr_rules::ActionInput;
use skr_rules::Session;
use skr_rules::Unit;
use skr_world::Position;
use skr_world::find_path;

/// Choose one action for the AI-driven unit currently holding the turn.
/// Deterministic: candidate targets are ordered by distance, then id.
pub fn decide(s: &Session, unit_id: &UnitId) -> ActionInput {
    let end = ActionInput::EndTurn {
        unit_id: unit_id.clone(),
    };
    let unit = match s.unit(unit_id) {
        Some(u) => u.clone(),
        None => return end,
    };
    let turn = match s.combat().turn.as_ref() {
        Some(t) if &t.unit_id == unit_id => t.clone(),
        _ => return end,
    };
    let target = match closest_enemy(s, &unit) {
        Some(t) => t,
        None => return end,
    };
    if turn.has_attacked {
        return end;
    }
    if unit.position.chebyshev(&target.position) <= unit.stats.attack_range {
        return ActionInput::Attack {
            unit_id: unit_id.clone(),
            target_id: target.id.clone(),
        };
    }
    match approach(s, &unit, &target, turn.movement_remaining) {
        Some(path) => ActionInput::Move {
            unit_id: unit_id.clone(),
            path,
        },
        None => end,
    }
}

fn closest_enemy(s: &Session, unit: &Unit) -> Option<Unit> {
    s.units()
        .values()
        .filter(|u| u.alive() && u.team.hostile_to(&unit.team))
        .min_by_key(|u| (unit.position.chebyshev(&u.position), u.id.clone()))
        .cloned()
}

/// The longest stoppable prefix of the A* path toward `target`, bounded
/// by the movement budget. The path's final tile (the target itself) is
/// never included.
fn approach(s: &Session, unit: &Unit, target: &Unit, budget: u32) -> Option<Vec<Position>> {
    if budget == 0 {
        return None;
    }
    let r#gen = s.mapgen();
    let pass = s.passability(unit.team, &unit.id);
    let full = find_path(&r#gen, unit.position, target.position, &pass)?;
    let mut cut = full.len().saturating_sub(1).min(budget as usize + 1);
    while cut >= 2 {
        let stop = full[cut - 1];
        if s.occupant(stop, Some(&unit.id)).is_none() {
            return Some(full[..cut].to_vec());
        }
        cut -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use skr_core::ID;
    use skr_rules::Control;
    use skr_rules::MonsterSpawn;
    use skr_rules::SessionConfig;
    use skr_rules::Stats;
    use skr_rules::engine;

    fn monster(hp: u32, position: Position) -> MonsterSpawn {
        MonsterSpawn {
            name: "Skeleton".to_string(),
            stats: Stats {
                hp,
                max_hp: hp,
                attack: 4,
                defense: 0,
                initiative: 8,
                move_range: 3,
                attack_range: 1,
            },
            position: Some(position),
        }
    }

    fn arena(monsters: Vec<MonsterSpawn>) -> Session {
        let config = SessionConfig {
            players: 1,
            wall_density: 0.0,
            shop_offset: Position::new(1000, 1000),
            monsters,
            ..SessionConfig::default()
        };
        let s = Session::new(ID::default(), 42, config);
        let (s, _) = engine::transition(&s, &Control::Join { user: "alice".to_string() });
        let (s, _) = engine::transition(&s, &Control::StartCombat);
        s
    }

    fn monsters_turn(s: &Session) -> Session {
        let (s, _) = engine::apply(
            s,
            &ActionInput::EndTurn {
                unit_id: "P1".to_string(),
            },
        )
        .expect("hand over to M1");
        s
    }

    #[test]
    fn adjacent_monster_attacks() {
        let s = monsters_turn(&arena(vec![monster(10, Position::new(1, 0))]));
        assert_eq!(
            decide(&s, &"M1".to_string()),
            ActionInput::Attack {
                unit_id: "M1".to_string(),
                target_id: "P1".to_string(),
            }
        );
    }

    #[test]
    fn distant_monster_closes_in() {
        let s = monsters_turn(&arena(vec![monster(10, Position::new(6, 0))]));
        match decide(&s, &"M1".to_string()) {
            ActionInput::Move { unit_id, path } => {
                assert_eq!(unit_id, "M1");
                assert_eq!(path[0], Position::new(6, 0));
                assert!(path.len() - 1 <= 3, "bounded by move range");
                // Strictly closer to P1 at the origin.
                let before = Position::new(6, 0).chebyshev(&Position::ORIGIN);
                let after = path.last().expect("step").chebyshev(&Position::ORIGIN);
                assert!(after < before);
            }
            other => panic!("expected a move, got {:?}", other),
        }
    }

    #[test]
    fn monster_attacks_after_closing_in() {
        let s = monsters_turn(&arena(vec![monster(10, Position::new(3, 0))]));
        let action = decide(&s, &"M1".to_string());
        let (s, _) = engine::apply(&s, &action).expect("move applies");
        // Now adjacent: the next tick attacks.
        assert_eq!(
            decide(&s, &"M1".to_string()),
            ActionInput::Attack {
                unit_id: "M1".to_string(),
                target_id: "P1".to_string(),
            }
        );
    }

    #[test]
    fn spent_monster_ends_turn() {
        let s = monsters_turn(&arena(vec![monster(10, Position::new(1, 0))]));
        let attack = decide(&s, &"M1".to_string());
        let (s, _) = engine::apply(&s, &attack).expect("attack applies");
        assert_eq!(
            decide(&s, &"M1".to_string()),
            ActionInput::EndTurn {
                unit_id: "M1".to_string(),
            }
        );
    }

    #[test]
    fn decisions_are_deterministic() {
        let s = monsters_turn(&arena(vec![monster(10, Position::new(6, 2))]));
        let a = decide(&s, &"M1".to_string());
        let b = decide(&s, &"M1".to_string());
        assert_eq!(a, b);
    }
}
