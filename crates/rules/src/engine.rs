//! Validation and execution of game actions.
//!
//! Both entry points are pure: they take the current state by reference
//! and return a fresh state plus the events emitted, so a rejected or
//! panicking action can never leave a session half-applied.

use super::ActionInput;
use super::CombatPhase;
use super::Control;
use super::EndResult;
use super::Event;
use super::Inventory;
use super::LootDrop;
use super::LootItem;
use super::Presence;
use super::RuleViolation;
use super::Session;
use super::Team;
use super::TurnState;
use super::Unit;
use super::combat::initiative_order;
use rand::Rng;
use skr_core::CRIT_CHANCE;
use skr_core::GRACE_PERIOD;
use skr_core::MIN_DAMAGE;
use skr_core::Millis;
use skr_core::UnitId;
use skr_core::UserId;
use skr_core::WeaponId;
use skr_world::Position;

/// Validate and execute one game action.
///
/// On success returns the successor state and the events emitted, with
/// the events already appended to the successor's turn history. On a
/// rule violation the input state is untouched and nothing was emitted.
pub fn apply(
    state: &Session,
    action: &ActionInput,
) -> Result<(Session, Vec<Event>), RuleViolation> {
    let mut next = state.clone();
    let mut events = Vec::new();
    match action {
        ActionInput::Move { unit_id, path } => do_move(&mut next, &mut events, unit_id, path)?,
        ActionInput::Attack { unit_id, target_id } => {
            do_attack(&mut next, &mut events, unit_id, target_id)?
        }
        ActionInput::CollectLoot { unit_id, loot_drop_id } => {
            do_collect(&mut next, &mut events, unit_id, loot_drop_id)?
        }
        ActionInput::EndTurn { unit_id } => {
            require_turn(&next, unit_id)?;
            advance_turn(&mut next, &mut events);
        }
        ActionInput::BuyWeapon { user_id, weapon_id } => {
            do_buy(&mut next, &mut events, user_id, weapon_id)?
        }
        ActionInput::Sleep { unit_id } => do_sleep(&mut next, &mut events, unit_id)?,
    }
    commit(&mut next, &events);
    Ok((next, events))
}

/// Execute a membership or phase control transition. Infallible: an
/// inapplicable control is a no-op that emits nothing.
pub fn transition(state: &Session, control: &Control) -> (Session, Vec<Event>) {
    let mut next = state.clone();
    let mut events = Vec::new();
    match control {
        Control::Join { user } => do_join(&mut next, &mut events, user),
        Control::Disconnect { user } => match next.members.get_mut(user) {
            Some(presence) if *presence == Presence::Connected => {
                *presence = Presence::Disconnected {
                    grace_period_ms: GRACE_PERIOD.as_millis() as Millis,
                };
                events.push(Event::PlayerDisconnected {
                    user_id: user.clone(),
                    grace_period_ms: GRACE_PERIOD.as_millis() as Millis,
                });
            }
            _ => {}
        },
        Control::Reconnect { user } => match next.members.get_mut(user) {
            Some(presence) if matches!(presence, Presence::Disconnected { .. }) => {
                *presence = Presence::Connected;
                events.push(Event::PlayerReconnected {
                    user_id: user.clone(),
                });
            }
            _ => {}
        },
        Control::Leave { user, reason } => {
            if next.members.remove(user).is_some() {
                events.push(Event::PlayerLeft {
                    user_id: user.clone(),
                    reason: *reason,
                });
            }
        }
        Control::StartCombat => do_start(&mut next, &mut events),
        Control::Abort => {
            if next.combat.phase != CombatPhase::Ended {
                next.combat.phase = CombatPhase::Ended;
                next.combat.end_result = Some(EndResult::Aborted);
                next.combat.turn = None;
                events.push(Event::CombatEnded {
                    result: EndResult::Aborted,
                });
            }
        }
    }
    commit(&mut next, &events);
    (next, events)
}

fn commit(next: &mut Session, events: &[Event]) {
    for event in events {
        log::debug!("[engine {}] {}", next.id, event);
        next.record(event.clone());
    }
}

// ---- turn-holder validation ------------------------------------------------

fn require_turn(s: &Session, unit_id: &UnitId) -> Result<(), RuleViolation> {
    let holder = match s.combat.turn_holder() {
        Some(h) => h,
        None => {
            return Err(RuleViolation::NotYourTurn(
                "no turn is in progress".to_string(),
            ));
        }
    };
    if holder != unit_id {
        return Err(RuleViolation::NotYourTurn(format!(
            "{} holds the turn",
            holder
        )));
    }
    match s.unit(unit_id) {
        Some(u) if u.alive() => Ok(()),
        Some(_) | None => Err(RuleViolation::UnitDead(format!("{} is defeated", unit_id))),
    }
}

// ---- move ------------------------------------------------------------------

fn do_move(
    s: &mut Session,
    events: &mut Vec<Event>,
    unit_id: &UnitId,
    path: &[Position],
) -> Result<(), RuleViolation> {
    require_turn(s, unit_id)?;
    let unit = s.units[unit_id].clone();
    let first = match path.first() {
        Some(p) => *p,
        None => return Err(RuleViolation::PathInvalid("empty path".to_string())),
    };
    if first != unit.position {
        return Err(RuleViolation::PathInvalid(
            "path must start at the unit's position".to_string(),
        ));
    }
    let steps = (path.len() - 1) as u32;
    let budget = s.combat.turn.as_ref().map(|t| t.movement_remaining).unwrap_or(0);
    if steps > budget {
        return Err(RuleViolation::OutOfRange(format!(
            "{} steps exceed remaining movement {}",
            steps, budget
        )));
    }
    for pair in path.windows(2) {
        if pair[0].chebyshev(&pair[1]) != 1 {
            return Err(RuleViolation::PathInvalid(format!(
                "{} -> {} is not one step",
                pair[0], pair[1]
            )));
        }
    }
    let r#gen = s.mapgen();
    for p in &path[1..] {
        if !r#gen.walkable(*p) {
            return Err(RuleViolation::PathInvalid(format!("{} is not walkable", p)));
        }
    }
    // Intermediate tiles are pass-through: friendlies allowed, enemies not.
    for p in path.iter().take(path.len() - 1).skip(1) {
        if let Some(blocker) = s.occupant(*p, Some(unit_id)) {
            if blocker.team.hostile_to(&unit.team) {
                return Err(RuleViolation::PathInvalid(format!(
                    "{} is blocked by {}",
                    p, blocker.id
                )));
            }
        }
    }
    // The final tile is stop-on: no unit of either side may hold it.
    let last = *path.last().expect("non-empty path");
    if s.occupant(last, Some(unit_id)).is_some() {
        return Err(RuleViolation::Occupied(format!("{} is occupied", last)));
    }
    s.units.get_mut(unit_id).expect("validated").position = last;
    if let Some(turn) = s.combat.turn.as_mut() {
        turn.movement_remaining -= steps;
    }
    events.push(Event::UnitMoved {
        unit_id: unit_id.clone(),
        path: path.to_vec(),
    });
    Ok(())
}

// ---- attack ----------------------------------------------------------------

fn do_attack(
    s: &mut Session,
    events: &mut Vec<Event>,
    unit_id: &UnitId,
    target_id: &UnitId,
) -> Result<(), RuleViolation> {
    require_turn(s, unit_id)?;
    if s.combat.turn.as_ref().map(|t| t.has_attacked).unwrap_or(false) {
        return Err(RuleViolation::AlreadyAttacked(format!(
            "{} already attacked this turn",
            unit_id
        )));
    }
    let attacker = s.units[unit_id].clone();
    let target = match s.unit(target_id) {
        Some(t) => t.clone(),
        None => {
            return Err(RuleViolation::UnknownAction(format!(
                "no such unit {}",
                target_id
            )));
        }
    };
    if !target.alive() {
        return Err(RuleViolation::UnitDead(format!("{} is already defeated", target_id)));
    }
    if !attacker.team.hostile_to(&target.team) {
        return Err(RuleViolation::UnknownAction(format!(
            "{} is not hostile to {}",
            target_id, unit_id
        )));
    }
    let distance = attacker.position.chebyshev(&target.position);
    if distance > attacker.stats.attack_range {
        return Err(RuleViolation::OutOfRange(format!(
            "{} is {} tiles away, range is {}",
            target_id, distance, attacker.stats.attack_range
        )));
    }
    let bonus = attacker
        .owner
        .as_ref()
        .and_then(|user| s.inventory(user))
        .map(|inv| inv.equipped_bonus())
        .unwrap_or(0);
    let n = (s.turn_history.len()) as u64;
    let mut damage = (attacker.stats.attack + bonus)
        .saturating_sub(target.stats.defense)
        .max(MIN_DAMAGE);
    if s.rng().at("crit", n).random_bool(CRIT_CHANCE) {
        damage *= 2;
    }
    let remaining = target.stats.hp.saturating_sub(damage);
    s.units.get_mut(target_id).expect("validated").stats.hp = remaining;
    if let Some(turn) = s.combat.turn.as_mut() {
        turn.has_attacked = true;
    }
    events.push(Event::UnitAttacked {
        attacker_id: unit_id.clone(),
        target_id: target_id.clone(),
    });
    events.push(Event::UnitDamaged {
        unit_id: target_id.clone(),
        damage,
        remaining_hp: remaining,
    });
    if remaining == 0 {
        events.push(Event::UnitDefeated {
            unit_id: target_id.clone(),
        });
        if target.team == Team::Monster {
            let drop = roll_loot(s, n, target.position);
            s.loot_drops.insert(drop.id.clone(), drop.clone());
            events.push(Event::LootDropped { loot_drop: drop });
        }
        s.units.remove(target_id);
    }
    Ok(())
}

/// Items derived from the seeded table: gold always, silver sometimes,
/// rarely a weapon.
fn roll_loot(s: &mut Session, n: u64, position: Position) -> LootDrop {
    let ref mut rng = s.rng().at("loot", n);
    let mut items = vec![LootItem::Gold {
        name: "Gold".to_string(),
        value: rng.random_range(10..=30),
    }];
    if rng.random_bool(0.25) {
        items.push(LootItem::Silver {
            name: "Silver".to_string(),
            value: rng.random_range(5..=15),
        });
    }
    if !s.config.loot_weapons.is_empty() && rng.random_bool(0.15) {
        let weapon = s.config.loot_weapons[rng.random_range(0..s.config.loot_weapons.len())].clone();
        items.push(LootItem::Weapon { weapon });
    }
    let id = format!("loot-{}", s.next_loot);
    s.next_loot += 1;
    LootDrop { id, position, items }
}

// ---- loot collection -------------------------------------------------------

fn do_collect(
    s: &mut Session,
    events: &mut Vec<Event>,
    unit_id: &UnitId,
    loot_drop_id: &str,
) -> Result<(), RuleViolation> {
    require_turn(s, unit_id)?;
    let unit = s.units[unit_id].clone();
    if !unit.team.is_player_side() {
        return Err(RuleViolation::UnknownAction(
            "monsters do not collect loot".to_string(),
        ));
    }
    let user = match unit.owner {
        Some(ref user) => user.clone(),
        None => {
            return Err(RuleViolation::UnknownAction(format!(
                "{} has no controller",
                unit_id
            )));
        }
    };
    let drop = match s.loot_drops.get(loot_drop_id) {
        Some(d) => d.clone(),
        None => {
            return Err(RuleViolation::UnknownAction(format!(
                "no such loot drop {}",
                loot_drop_id
            )));
        }
    };
    if unit.position.chebyshev(&drop.position) > 1 {
        return Err(RuleViolation::NotAdjacent(format!(
            "{} is not adjacent to {}",
            unit_id, loot_drop_id
        )));
    }
    let inventory = s.inventories.entry(user.clone()).or_default();
    for item in drop.items {
        match item {
            LootItem::Gold { value, .. } | LootItem::Silver { value, .. } => {
                inventory.gold += value;
            }
            LootItem::Weapon { weapon } => inventory.acquire(weapon),
        }
    }
    let inventory = inventory.clone();
    s.loot_drops.remove(loot_drop_id);
    events.push(Event::LootCollected {
        loot_drop_id: loot_drop_id.to_string(),
        user_id: user.clone(),
    });
    events.push(Event::InventoryChanged {
        user_id: user,
        inventory,
    });
    Ok(())
}

// ---- turn advancement ------------------------------------------------------

/// End the current turn: emit `turn_ended`, settle end-of-combat, or
/// hand the turn to the next living unit (wrapping increments the round).
fn advance_turn(s: &mut Session, events: &mut Vec<Event>) {
    if let Some(turn) = s.combat.turn.take() {
        events.push(Event::TurnEnded {
            unit_id: turn.unit_id,
        });
    }
    let monsters_alive = s.units.values().any(|u| u.team == Team::Monster && u.alive());
    let players_alive = s.units.values().any(|u| u.team.is_player_side() && u.alive());
    if !monsters_alive || !players_alive {
        let result = match monsters_alive {
            false => EndResult::Victory,
            true => EndResult::Defeat,
        };
        s.combat.phase = CombatPhase::Ended;
        s.combat.end_result = Some(result);
        events.push(Event::CombatEnded { result });
        return;
    }
    let order = s.combat.initiative_order.clone();
    let mut index = s.combat.current_turn_index;
    let mut round = s.combat.round;
    let unit_id = loop {
        index = (index + 1) % order.len();
        if index == 0 {
            round += 1;
        }
        if let Some(unit) = s.units.get(&order[index]) {
            if unit.alive() {
                break unit.id.clone();
            }
        }
    };
    let move_range = s.units[&unit_id].stats.move_range;
    s.combat.current_turn_index = index;
    s.combat.round = round;
    s.combat.turn = Some(TurnState {
        unit_id: unit_id.clone(),
        movement_remaining: move_range,
        has_attacked: false,
    });
    events.push(Event::TurnStarted { unit_id, round });
}

// ---- shop ------------------------------------------------------------------

fn do_buy(
    s: &mut Session,
    events: &mut Vec<Event>,
    user_id: &UserId,
    weapon_id: &WeaponId,
) -> Result<(), RuleViolation> {
    if !s.combat.in_progress() {
        return Err(RuleViolation::NotYourTurn(
            "combat is not running".to_string(),
        ));
    }
    let unit = match s.unit_owned_by(user_id) {
        Some(u) => u.clone(),
        None => {
            return Err(RuleViolation::UnknownAction(format!(
                "{} controls no unit",
                user_id
            )));
        }
    };
    let r#gen = s.mapgen();
    let near_shop = std::iter::once(unit.position)
        .chain(unit.position.neighbors())
        .any(|p| p == r#gen.shop());
    if !near_shop {
        return Err(RuleViolation::NotAdjacent(format!(
            "{} is not adjacent to a shop",
            unit.id
        )));
    }
    let weapon = match s.config.shop_catalog.iter().find(|w| &w.id == weapon_id) {
        Some(w) => w.clone(),
        None => {
            return Err(RuleViolation::UnknownAction(format!(
                "no such weapon {}",
                weapon_id
            )));
        }
    };
    let inventory = s.inventories.entry(user_id.clone()).or_default();
    if inventory.owns(weapon_id) {
        return Err(RuleViolation::DuplicateWeapon(format!(
            "{} already owned",
            weapon_id
        )));
    }
    if inventory.gold < weapon.price {
        return Err(RuleViolation::InsufficientGold(format!(
            "{} costs {}, {} gold held",
            weapon_id, weapon.price, inventory.gold
        )));
    }
    inventory.gold -= weapon.price;
    inventory.acquire(weapon);
    let inventory = inventory.clone();
    events.push(Event::InventoryChanged {
        user_id: user_id.clone(),
        inventory,
    });
    Ok(())
}

// ---- sleep -----------------------------------------------------------------

fn do_sleep(
    s: &mut Session,
    events: &mut Vec<Event>,
    unit_id: &UnitId,
) -> Result<(), RuleViolation> {
    require_turn(s, unit_id)?;
    let unit = s.units[unit_id].clone();
    if !unit.team.is_player_side() {
        return Err(RuleViolation::UnknownAction(
            "monsters do not sleep".to_string(),
        ));
    }
    let amount = s
        .config
        .heal_amount
        .min(unit.stats.max_hp - unit.stats.hp);
    s.units.get_mut(unit_id).expect("validated").stats.hp += amount;
    events.push(Event::UnitHealed {
        unit_id: unit_id.clone(),
        amount,
    });
    // Sleeping does not consume movement but does end the turn.
    advance_turn(s, events);
    Ok(())
}

// ---- join / start ----------------------------------------------------------

fn do_join(s: &mut Session, events: &mut Vec<Event>, user: &UserId) {
    if s.members.contains_key(user) {
        return;
    }
    let spectator = s.combat.phase != CombatPhase::NotStarted;
    if spectator {
        s.members.insert(user.clone(), Presence::Spectating);
        events.push(Event::PlayerJoined {
            user_id: user.clone(),
            spectator: true,
        });
        return;
    }
    s.members.insert(user.clone(), Presence::Connected);
    events.push(Event::PlayerJoined {
        user_id: user.clone(),
        spectator: false,
    });
    s.next_player += 1;
    let unit = Unit {
        id: format!("P{}", s.next_player),
        team: Team::Player,
        name: user.clone(),
        position: s.player_spawn(),
        stats: s.config.player_stats,
        owner: Some(user.clone()),
    };
    events.push(Event::UnitSpawned { unit: unit.clone() });
    s.units.insert(unit.id.clone(), unit);
    let inventory = Inventory::with_gold(s.config.starting_gold);
    s.inventories.insert(user.clone(), inventory.clone());
    events.push(Event::InventoryChanged {
        user_id: user.clone(),
        inventory,
    });
}

fn do_start(s: &mut Session, events: &mut Vec<Event>) {
    if s.combat.phase != CombatPhase::NotStarted || s.units.is_empty() {
        return;
    }
    let order = initiative_order(s.units.iter().map(|(id, u)| (id, u.stats.initiative)));
    let first = order[0].clone();
    let move_range = s.units[&first].stats.move_range;
    s.combat.phase = CombatPhase::InProgress;
    s.combat.round = 1;
    s.combat.initiative_order = order.clone();
    s.combat.current_turn_index = 0;
    s.combat.turn = Some(TurnState {
        unit_id: first.clone(),
        movement_remaining: move_range,
        has_attacked: false,
    });
    events.push(Event::CombatStarted {
        round: 1,
        initiative_order: order,
    });
    events.push(Event::TurnStarted {
        unit_id: first,
        round: 1,
    });
}
