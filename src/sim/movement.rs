/// Applying moves: the mutating half of the resolver.
///
/// `check_move` = `rules::plan_move` (pure) + `apply_effects`. A `true`
/// result authorises the caller to `move_actor`, which relocates the actor
/// and then fires `on_leave` on the source tile and `on_enter` on the
/// destination, in that order.

use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::{ActorKind, ItemKind};
use crate::domain::rules::{self, DeathCause, Effect, MapView};
use crate::error::SessionResult;
use crate::sim::event::{GameEvent, Outcome};
use crate::sim::tiles;
use crate::sim::world::World;

impl World {
    pub fn view(&self) -> MapView<'_> {
        MapView {
            tiles: &self.tiles,
            actors: &self.actors,
            items: &self.items,
            inventory: &self.inventory,
            level_running: self.level_running,
        }
    }
}

/// Validate a move and apply its side effects. Returns whether the actor at
/// `from` may now step towards `dir`.
pub fn check_move(world: &mut World, from: Coord, dir: Direction) -> SessionResult<bool> {
    let plan = rules::plan_move(&world.view(), from, dir);
    apply_effects(world, &plan.effects)?;
    Ok(plan.legal)
}

pub fn apply_effects(world: &mut World, effects: &[Effect]) -> SessionResult<()> {
    for effect in effects {
        match *effect {
            Effect::UseKey { door, colour } => {
                let World { tiles, inventory, .. } = &mut *world;
                let opened = tiles.get_mut(door).is_some_and(|t| t.test_lock(inventory));
                if opened {
                    world.emit(GameEvent::DoorOpened { at: door, colour });
                }
            }
            Effect::SpendChips { socket, amount } => {
                world.inventory.chips = world.inventory.chips.saturating_sub(amount);
                let opened = world.tiles.get_mut(socket).is_some_and(|t| t.deduct_chips(amount));
                if opened {
                    world.emit(GameEvent::SocketOpened { at: socket });
                }
            }
            Effect::Push { block, dir } => {
                if check_move(world, block, dir)? {
                    if let Some(b) = world.actors.get_mut(block) {
                        b.facing = dir;
                    }
                    let to = move_actor(world, block, dir)?;
                    world.emit(GameEvent::BlockPushed { from: block, to });
                }
            }
            Effect::Collect { at, by } => collect(world, at, by),
            Effect::Kill { victim, cause } => kill(world, victim, cause),
        }
    }
    Ok(())
}

/// Relocate the actor at `from` one step, then fire leave/enter hooks.
/// Returns where the actor ended up (unchanged if the cell was taken).
/// A source tile that refuses the leave fails the call before any layer
/// changes.
pub fn move_actor(world: &mut World, from: Coord, dir: Direction) -> SessionResult<Coord> {
    let to = dir.advance(from);
    if world.actors.contains(to) {
        return Ok(from);
    }
    tiles::check_leave(world, from)?;
    let Some(mut actor) = world.actors.remove(from) else {
        return Ok(from);
    };
    actor.pos = to;
    let id = actor.id;
    world.actors.insert(to, actor);
    tiles::on_leave(world, from, id)?;
    tiles::on_enter(world, to, id)?;
    Ok(to)
}

/// Remove an actor. Killing the player records the terminal outcome.
pub fn kill(world: &mut World, victim: Coord, cause: DeathCause) {
    let Some(actor) = world.actors.remove(victim) else {
        return;
    };
    world.emit(GameEvent::ActorKilled { at: victim, cause });
    if actor.is_player() {
        world.finish(Outcome::Lost(cause));
    }
}

fn collect(world: &mut World, at: Coord, by: Coord) {
    let Some(item) = world.items.remove(at) else {
        return;
    };
    let speed_ticks = world.rules.speed_ticks;
    let invincibility_ticks = world.rules.invincibility_ticks;
    match item.kind {
        ItemKind::Chip => world.inventory.chips += 1,
        ItemKind::Key(colour) => world.inventory.add_key(colour),
        ItemKind::ExtraLife => world.inventory.extra_lives += 1,
        ItemKind::IncreaseTime => world.clock.add_seconds(world.rules.bonus_seconds),
        ItemKind::Speed => {
            if let Some(p) = world.actors.get_mut(by).and_then(|a| a.player_state_mut()) {
                p.speed_ticks = speed_ticks;
            }
        }
        ItemKind::Invincibility => {
            if let Some(p) = world.actors.get_mut(by).and_then(|a| a.player_state_mut()) {
                p.invincible_ticks = invincibility_ticks;
            }
        }
    }
    world.emit(GameEvent::ItemCollected { at, item: item.kind });
}

/// Self-initiated player step, gated by the move interval and the trapped
/// flag. Returns whether the player moved.
pub fn player_step(world: &mut World, dir: Direction) -> SessionResult<bool> {
    let Some(player) = world.player().copied() else {
        return Ok(false);
    };
    let ActorKind::Player(state) = player.kind else {
        return Ok(false);
    };
    if player.trapped {
        return Ok(false);
    }
    let interval = if state.speed_ticks > 0 {
        world.rules.speed_move_interval
    } else {
        world.rules.player_move_interval
    };
    if state.last_move.is_some_and(|last| player.ticks < last + interval) {
        return Ok(false);
    }

    if let Some(p) = world.actors.get_mut(player.pos) {
        p.facing = dir;
    }
    if !check_move(world, player.pos, dir)? {
        return Ok(false);
    }
    let to = move_actor(world, player.pos, dir)?;
    if let Some(p) = world.actors.get_mut(to).and_then(|a| a.player_state_mut()) {
        p.last_move = Some(player.ticks);
    }
    Ok(to != player.pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{KeyColour, TileKind};
    use crate::sim::testkit::world_from;
    use proptest::prelude::*;

    const PLAYER: Coord = Coord::new(1, 0);

    fn step(world: &mut World, dir: Direction) -> bool {
        // Fresh interval every call.
        if let Some(p) = world.player_mut().and_then(|a| a.player_state_mut()) {
            p.last_move = None;
        }
        player_step(world, dir).unwrap()
    }

    #[test]
    fn door_consumes_key_and_opens() {
        let mut w = world_from(&["PPR"], &[".*."], &["..."]);
        w.inventory.add_key(KeyColour::Red);
        assert!(step(&mut w, Direction::East));
        assert_eq!(w.tiles.get(Coord::new(2, 0)).unwrap().kind, TileKind::Path);
        assert_eq!(w.inventory.keys(KeyColour::Red), 0);
        assert!(w.events.contains(&GameEvent::DoorOpened { at: Coord::new(2, 0), colour: KeyColour::Red }));
    }

    #[test]
    fn socket_with_too_few_chips_keeps_them() {
        let mut w = world_from(&["PPS"], &[".*."], &["..."]);
        w.set_tile_kind(Coord::new(2, 0), TileKind::ChipSocket { required: 5 });
        w.inventory.chips = 3;
        assert!(!step(&mut w, Direction::East));
        assert_eq!(w.inventory.chips, 3);
        assert_eq!(w.player_pos(), Some(PLAYER));

        w.inventory.chips = 5;
        assert!(step(&mut w, Direction::East));
        assert_eq!(w.inventory.chips, 0);
        assert_eq!(w.tiles.get(Coord::new(2, 0)).unwrap().kind, TileKind::Path);
        // Stays open when walked back over.
        assert!(step(&mut w, Direction::West));
        assert!(step(&mut w, Direction::East));
    }

    #[test]
    fn pushing_a_block_into_water_fills_it() {
        let mut w = world_from(&["PPPO"], &[".*#."], &["...."]);
        assert!(step(&mut w, Direction::East));
        assert_eq!(w.player_pos(), Some(Coord::new(2, 0)));
        let block = w.actors.get(Coord::new(3, 0));
        assert!(block.is_none(), "block sinks");
        assert_eq!(w.tiles.get(Coord::new(3, 0)).unwrap().kind, TileKind::Path);
        assert!(step(&mut w, Direction::East));
        assert!(w.outcome.is_none());
    }

    #[test]
    fn walking_into_water_drowns() {
        let mut w = world_from(&["PPO"], &[".*."], &["..."]);
        assert!(step(&mut w, Direction::East));
        assert_eq!(w.outcome, Some(Outcome::Lost(DeathCause::Drown)));
        assert!(w.player_pos().is_none());
    }

    #[test]
    fn dirt_turns_to_path_under_player() {
        let mut w = world_from(&["PPD"], &[".*."], &["..."]);
        assert!(step(&mut w, Direction::East));
        assert_eq!(w.tiles.get(Coord::new(2, 0)).unwrap().kind, TileKind::Path);
    }

    #[test]
    fn exit_wins() {
        let mut w = world_from(&["PPE"], &[".*."], &["..."]);
        assert!(step(&mut w, Direction::East));
        assert!(matches!(w.outcome, Some(Outcome::Won { .. })));
    }

    #[test]
    fn pickups_apply_effects() {
        let mut w = world_from(&["PPPPPPP"], &["*......"], &[".c]v+xb"]);
        let remaining = w.clock.remaining_secs();
        for _ in 0..6 {
            assert!(step(&mut w, Direction::East));
        }
        assert_eq!(w.inventory.chips, 1);
        assert_eq!(w.inventory.extra_lives, 1);
        assert_eq!(w.inventory.keys(KeyColour::Blue), 1);
        assert_eq!(w.clock.remaining_secs(), remaining + w.rules.bonus_seconds);
        let p = *w.player().unwrap().player_state().unwrap();
        assert!(p.speed_ticks > 0 && p.invincible());
        assert!(w.items.is_empty());
    }

    #[test]
    fn move_interval_gates_held_input() {
        let mut w = world_from(&["PPPP"], &["*..."], &["...."]);
        assert!(player_step(&mut w, Direction::East).unwrap());
        assert!(!player_step(&mut w, Direction::East).unwrap(), "same tick");
        for _ in 0..4 {
            if let Some(a) = w.player_mut() {
                a.ticks += 1;
            }
        }
        assert!(player_step(&mut w, Direction::East).unwrap());
    }

    #[test]
    fn trapped_player_cannot_step() {
        let mut w = world_from(&["PPP"], &[".*."], &["..."]);
        if let Some(a) = w.player_mut() {
            a.trapped = true;
        }
        assert!(!step(&mut w, Direction::East));
    }

    #[test]
    fn killing_a_monster_is_not_an_outcome() {
        let mut w = world_from(&["PP"], &["%."], &[".."]);
        kill(&mut w, Coord::new(0, 0), DeathCause::Crush);
        assert!(w.actors.is_empty());
        assert!(w.outcome.is_none());
    }

    proptest! {
        // A denied move leaves the mover and the target terrain untouched.
        #[test]
        fn denied_moves_change_nothing(
            target in prop::sample::select(vec!['W', 'R', 'S', 'U', 'E', 'O', 'P']),
            occupant in prop::sample::select(vec!['.', '#', '%', '^', '@', ';']),
            mover in prop::sample::select(vec!['*', '#', '%', '^', '@']),
            dir_idx in 0usize..4,
        ) {
            let tiles = ["PPP".to_string(), format!("P{}P", target), "PPP".to_string()];
            let actors_row = format!(".{}.", occupant);
            let mover_row = format!(".{}.", mover);
            let mut w = world_from(
                &[tiles[0].as_str(), tiles[1].as_str(), tiles[2].as_str()],
                &[mover_row.as_str(), actors_row.as_str(), "..."],
                &["...", "...", "..."],
            );
            let from = Coord::new(1, 0);
            let dir = Direction::ALL[dir_idx];
            let to = dir.advance(from);
            let before_tile = w.tile_type_at(to);
            let mover_id = w.actors.get(from).map(|a| a.id);
            if !check_move(&mut w, from, dir).unwrap() {
                prop_assert_eq!(w.tile_type_at(to), before_tile);
                if w.outcome.is_none() {
                    prop_assert_eq!(w.actors.get(from).map(|a| a.id), mover_id);
                }
            }
        }

        // Walking into a wall any number of times is a no-op.
        #[test]
        fn walls_are_idempotent(times in 1usize..20) {
            let mut w = world_from(&["WPW"], &[".*."], &["..."]);
            w.inventory.chips = 2;
            for _ in 0..times {
                prop_assert!(!step(&mut w, Direction::West));
                prop_assert!(!step(&mut w, Direction::East));
            }
            prop_assert_eq!(w.player_pos(), Some(PLAYER));
            prop_assert_eq!(w.inventory.chips, 2);
        }
    }
}
