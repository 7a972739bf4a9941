/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Input: one player step, then queued minigame clicks
///   2. Level clock (TimeOut when it runs out)
///   3. Row-major scan: tile `on_tick`, then the actor standing there
///   4. A barnacle that spotted the player starts the minigame
///
/// The scan reads the layers live. An actor that moves East or South lands
/// on a cell the scan has not reached yet and is ticked again there.
/// The first terminal outcome ends the tick; whatever comes after it in the
/// scan does not run. Extra lives and restarts are the session's business.

use std::time::Instant;

use rand::seq::SliceRandom;

use crate::config::BarnacleConfig;
use crate::domain::ai;
use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::{Actor, ActorKind};
use crate::domain::rules::DeathCause;
use crate::error::SessionResult;
use crate::sim::event::{GameEvent, Outcome};
use crate::sim::minigame::{Minigame, MinigameStatus};
use crate::sim::movement::{check_move, kill, move_actor, player_step};
use crate::sim::tiles;
use crate::sim::world::World;

/// Input delivered to a single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickInput {
    pub direction: Option<Direction>,
    pub clicks: u32,
}

pub fn step(
    world: &mut World,
    input: TickInput,
    barnacle: &BarnacleConfig,
    now: Instant,
) -> SessionResult<Vec<GameEvent>> {
    if world.outcome.is_some() {
        return Ok(world.take_events());
    }
    world.tick += 1;

    if let Some(dir) = input.direction {
        player_step(world, dir)?;
    }
    resolve_minigame(world, input.clicks, barnacle, now);
    if world.outcome.is_some() {
        return Ok(world.take_events());
    }

    if world.clock.tick() {
        if let Some(at) = world.player_pos() {
            world.emit(GameEvent::ActorKilled { at, cause: DeathCause::TimeOut });
        }
        world.finish(Outcome::Lost(DeathCause::TimeOut));
        return Ok(world.take_events());
    }

    scan(world)?;

    if world.outcome.is_none() {
        if let Some(at) = world.barnacle_request.take() {
            world.minigame = Some(Minigame::start(at, now));
            world.emit(GameEvent::MinigameStarted { barnacle: at });
        }
    }
    Ok(world.take_events())
}

/// Phase 3 on its own: every cell in row-major order.
pub(crate) fn scan(world: &mut World) -> SessionResult<()> {
    for y in 0..world.height {
        for x in 0..world.width {
            let at = Coord::new(x, y);
            tiles::on_tick(world, at)?;
            if world.outcome.is_some() {
                return Ok(());
            }
            tick_actor(world, at)?;
            if world.outcome.is_some() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Called instead of `step` while the session is paused. Only a wall-clock
/// minigame deadline can fire here; everything else is frozen.
pub fn paused_step(world: &mut World, barnacle: &BarnacleConfig, now: Instant) -> Vec<GameEvent> {
    if barnacle.pause_suspends_deadline || world.outcome.is_some() {
        return Vec::new();
    }
    let lost = world
        .minigame
        .as_ref()
        .is_some_and(|game| game.resolve(barnacle, now) == MinigameStatus::Lost);
    if lost {
        world.minigame = None;
        if let Some(at) = world.player_pos() {
            kill(world, at, DeathCause::Barnacle);
        }
    }
    world.take_events()
}

// ── Minigame ──

fn resolve_minigame(world: &mut World, clicks: u32, cfg: &BarnacleConfig, now: Instant) {
    let tick_ms = world.clock.tick_rate_ms();
    let Some(game) = world.minigame.as_mut() else {
        return;
    };
    game.click(clicks);
    game.advance(tick_ms);
    match game.resolve(cfg, now) {
        MinigameStatus::Pending => {}
        MinigameStatus::Won => {
            let barnacle = game.barnacle;
            world.minigame = None;
            if world.actors.get(barnacle).is_some_and(|a| a.kind == ActorKind::Barnacle) {
                world.actors.remove(barnacle);
            }
            if let Some(player) = world.player().copied() {
                if !tiles::holds(world, player.pos, player.id) {
                    world.set_trapped(player.id, false);
                }
            }
            world.emit(GameEvent::MinigameWon { barnacle });
        }
        MinigameStatus::Lost => {
            world.minigame = None;
            if let Some(at) = world.player_pos() {
                kill(world, at, DeathCause::Barnacle);
            }
        }
    }
}

// ── Actors ──

fn due(actor: &Actor, interval: u64) -> bool {
    !actor.trapped && actor.ticks % interval.max(1) == 0
}

fn tick_actor(world: &mut World, at: Coord) -> SessionResult<()> {
    let Some(actor) = world.actors.get_mut(at) else {
        return Ok(());
    };
    actor.ticks += 1;
    if let Some(p) = actor.player_state_mut() {
        p.speed_ticks = p.speed_ticks.saturating_sub(1);
        p.invincible_ticks = p.invincible_ticks.saturating_sub(1);
    }
    let actor = *actor;

    match actor.kind {
        ActorKind::Player(_) | ActorKind::Block => Ok(()),
        ActorKind::Bug { follow_left } => {
            if !due(&actor, world.rules.bug_move_interval) {
                return Ok(());
            }
            let dir = ai::bug_direction(&world.view(), &actor, follow_left);
            try_move(world, at, dir)
        }
        ActorKind::PinkBall => {
            if !due(&actor, world.rules.pink_ball_move_interval) {
                return Ok(());
            }
            tick_pink_ball(world, &actor)
        }
        ActorKind::Frog => {
            if !due(&actor, world.rules.frog_move_interval) {
                return Ok(());
            }
            tick_frog(world, &actor)
        }
        ActorKind::Barnacle => {
            watch_row(world, at);
            Ok(())
        }
    }
}

/// Step towards `dir` if the resolver allows it. A refused move leaves the
/// facing alone.
fn try_move(world: &mut World, at: Coord, dir: Direction) -> SessionResult<()> {
    if check_move(world, at, dir)? {
        if let Some(a) = world.actors.get_mut(at) {
            a.facing = dir;
        }
        move_actor(world, at, dir)?;
    }
    Ok(())
}

fn tick_pink_ball(world: &mut World, ball: &Actor) -> SessionResult<()> {
    let at = ball.pos;
    let mut dir = ball.facing;
    if !check_move(world, at, dir)? {
        if world.outcome.is_some() {
            return Ok(());
        }
        dir = dir.flip();
        if let Some(a) = world.actors.get_mut(at) {
            a.facing = dir;
        }
        if !check_move(world, at, dir)? {
            return Ok(());
        }
    }
    move_actor(world, at, dir)?;
    Ok(())
}

fn tick_frog(world: &mut World, frog: &Actor) -> SessionResult<()> {
    let at = frog.pos;
    let towards = world
        .player_pos()
        .and_then(|player| ai::frog_direction(&world.view(), frog, player));
    if let Some(dir) = towards {
        return try_move(world, at, dir);
    }

    let mut dirs = Direction::ALL;
    dirs.shuffle(&mut world.rng);
    let view = world.view();
    let open = dirs
        .into_iter()
        .find(|d| view.traversable_for_monster(&frog.kind, d.advance(at)));
    match open {
        Some(dir) => try_move(world, at, dir),
        None => Ok(()),
    }
}

fn watch_row(world: &mut World, at: Coord) {
    if world.minigame.is_some() || world.barnacle_request.is_some() {
        return;
    }
    let Some(player) = world.player_pos() else {
        return;
    };
    if ai::barnacle_sees(&world.view(), at, player) {
        if let Some(p) = world.player_mut() {
            p.trapped = true;
        }
        world.barnacle_request = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::testkit::world_from;

    fn cfg() -> BarnacleConfig {
        GameConfig::default().barnacle
    }

    fn tick(world: &mut World, clicks: u32) -> Vec<GameEvent> {
        let input = TickInput { direction: None, clicks };
        step(world, input, &cfg(), Instant::now()).unwrap()
    }

    fn room(size: usize) -> Vec<String> {
        (0..size)
            .map(|y| {
                (0..size)
                    .map(|x| if x == 0 || y == 0 || x == size - 1 || y == size - 1 { 'W' } else { 'P' })
                    .collect()
            })
            .collect()
    }

    fn bug_trace(ticks: usize) -> Vec<(Coord, Direction)> {
        let rows = room(5);
        let tiles: Vec<&str> = rows.iter().map(String::as_str).collect();
        let mut w = world_from(&tiles, &[".....", ".$...", ".....", ".....", "....."], &[]);
        let mut trace = Vec::new();
        for _ in 0..ticks {
            tick(&mut w, 0);
            let bug = w.actors.values().next().copied().unwrap();
            trace.push((bug.pos, bug.facing));
        }
        trace
    }

    #[test]
    fn left_bug_circles_room_without_reversing() {
        let trace = bug_trace(400);
        let mut moves = 0;
        for pair in trace.windows(2) {
            let ((_, before), (_, after)) = (pair[0], pair[1]);
            assert_ne!(after, before.flip(), "bug reversed");
            if pair[0].0 != pair[1].0 {
                moves += 1;
            }
        }
        assert!(moves > 10);
        assert_eq!(trace, bug_trace(400), "same start, same path");
    }

    #[test]
    fn boxed_in_bug_keeps_its_heading() {
        let mut w = world_from(&["WWW", "WPW", "WWW"], &["...", ".$.", "..."], &[]);
        let interval = w.rules.bug_move_interval as usize;
        for _ in 0..4 {
            for _ in 0..interval {
                tick(&mut w, 0);
            }
            let bug = w.actors.get(Coord::new(1, 1)).copied().unwrap();
            assert_eq!(bug.facing, Direction::North);
        }
    }

    #[test]
    fn bug_in_a_dead_end_turns_round() {
        let mut w = world_from(&["WWW", "WPW", "WPW", "WWW"], &["...", ".$.", "...", "..."], &[]);
        let interval = w.rules.bug_move_interval as usize;
        for _ in 0..interval - 1 {
            tick(&mut w, 0);
        }
        assert!(w.actors.contains(Coord::new(1, 1)));
        tick(&mut w, 0);
        let bug = w.actors.get(Coord::new(1, 2)).copied().unwrap();
        assert_eq!(bug.facing, Direction::South);
    }

    fn walled_off_frog() -> Coord {
        let tiles = ["PPPWP", "PPPWP", "PPPWP"];
        let mut w = world_from(&tiles, &[".....", ".^..*", "....."], &[]);
        let interval = w.rules.frog_move_interval as usize;
        for _ in 0..interval {
            tick(&mut w, 0);
        }
        assert!(w.outcome.is_none());
        w.actors.find(crate::domain::tile::TileType::Frog)[0]
    }

    #[test]
    fn frog_without_a_path_hops_somewhere_legal() {
        let start = Coord::new(1, 1);
        let frog = walled_off_frog();
        assert_eq!(frog.manhattan(start), 1);
        assert!(frog.x < 3, "stays on its side of the wall");
        assert_eq!(frog, walled_off_frog(), "same seed, same hop");
    }

    #[test]
    fn frog_closes_in_on_open_grid() {
        let tiles = vec!["PPPPPPPPPP"; 10];
        let mut actors = vec![".........."; 10];
        actors[0] = "^.........";
        actors[9] = ".........*";
        let mut w = world_from(&tiles, &actors, &[]);
        let player = Coord::new(9, 9);
        let mut last = Coord::new(0, 0);
        for _ in 0..400 {
            tick(&mut w, 0);
            if w.outcome.is_some() {
                break;
            }
            let frog = w.actors.find(crate::domain::tile::TileType::Frog)[0];
            if frog != last {
                assert!(frog.manhattan(player) < last.manhattan(player));
                last = frog;
            }
        }
        assert_eq!(w.outcome, Some(Outcome::Lost(DeathCause::FrogKill)));
    }

    #[test]
    fn wedged_pink_ball_flips_in_place() {
        let mut w = world_from(&["WPW"], &[".@."], &[]);
        if let Some(b) = w.actors.get_mut(Coord::new(1, 0)) {
            b.facing = Direction::East;
        }
        let interval = w.rules.pink_ball_move_interval as usize;
        for n in 0..4 {
            for _ in 0..interval {
                tick(&mut w, 0);
            }
            let ball = w.actors.get(Coord::new(1, 0)).copied().unwrap();
            let expected = if n % 2 == 0 { Direction::West } else { Direction::East };
            assert_eq!(ball.facing, expected);
        }
    }

    #[test]
    fn pink_ball_bounces_back_and_forth() {
        let mut w = world_from(&["WPPW"], &[".@.."], &[]);
        if let Some(b) = w.actors.get_mut(Coord::new(1, 0)) {
            b.facing = Direction::West;
        }
        let interval = w.rules.pink_ball_move_interval as usize;
        for _ in 0..interval {
            tick(&mut w, 0);
        }
        assert!(w.actors.contains(Coord::new(2, 0)), "flipped East and moved");
    }

    #[test]
    fn pink_ball_flattens_player() {
        let mut w = world_from(&["PPP"], &["@*."], &[]);
        if let Some(b) = w.actors.get_mut(Coord::new(0, 0)) {
            b.facing = Direction::East;
        }
        for _ in 0..3 {
            tick(&mut w, 0);
        }
        assert_eq!(w.outcome, Some(Outcome::Lost(DeathCause::Bounced)));
    }

    fn barnacle_world() -> World {
        let mut w = world_from(&["PPPPP"], &[";...*"], &[]);
        let events = tick(&mut w, 0);
        assert!(events.contains(&GameEvent::MinigameStarted { barnacle: Coord::new(0, 0) }));
        assert!(w.player().unwrap().trapped);
        w
    }

    #[test]
    fn three_clicks_beat_the_barnacle() {
        let mut w = barnacle_world();
        tick(&mut w, 2);
        assert!(w.minigame.is_some());
        let events = tick(&mut w, 1);
        assert!(events.contains(&GameEvent::MinigameWon { barnacle: Coord::new(0, 0) }));
        assert!(w.minigame.is_none());
        assert!(!w.player().unwrap().trapped);
        assert!(w.actors.get(Coord::new(0, 0)).is_none());
        assert!(w.outcome.is_none());
    }

    #[test]
    fn beating_the_barnacle_leaves_an_armed_trap_holding() {
        let mut w = world_from(&["TPPP"], &["*..;"], &[]);
        assert!(w.player().unwrap().trapped, "caught by the trap on load");
        let events = tick(&mut w, 0);
        assert!(events.contains(&GameEvent::MinigameStarted { barnacle: Coord::new(3, 0) }));
        let events = tick(&mut w, 3);
        assert!(events.contains(&GameEvent::MinigameWon { barnacle: Coord::new(3, 0) }));
        assert!(w.player().unwrap().trapped);
        assert!(tiles::holds(&w, Coord::new(0, 0), w.player().unwrap().id));
    }

    #[test]
    fn fourth_click_is_fatal() {
        let mut w = barnacle_world();
        tick(&mut w, 4);
        assert_eq!(w.outcome, Some(Outcome::Lost(DeathCause::Barnacle)));
    }

    #[test]
    fn late_clicks_are_fatal() {
        let mut w = barnacle_world();
        let ticks = cfg().deadline_ms / w.clock.tick_rate_ms();
        for _ in 0..ticks {
            tick(&mut w, 0);
        }
        assert!(w.outcome.is_none());
        tick(&mut w, 3);
        assert_eq!(w.outcome, Some(Outcome::Lost(DeathCause::Barnacle)));
    }

    #[test]
    fn walls_hide_the_player_from_barnacles() {
        let mut w = world_from(&["PPWPP"], &[";...*"], &[]);
        tick(&mut w, 0);
        assert!(w.minigame.is_none());
        assert!(!w.player().unwrap().trapped);
    }

    #[test]
    fn clock_runs_out() {
        let mut w = world_from(&["PP"], &["*."], &[]);
        w.clock = crate::sim::clock::LevelClock::new(1, 50);
        for _ in 0..20 {
            tick(&mut w, 0);
        }
        assert_eq!(w.outcome, Some(Outcome::Lost(DeathCause::TimeOut)));
    }

    #[test]
    fn power_ups_wear_off() {
        let mut w = world_from(&["PP"], &["*."], &[]);
        if let Some(p) = w.player_mut().and_then(|a| a.player_state_mut()) {
            p.invincible_ticks = 2;
        }
        tick(&mut w, 0);
        assert!(w.player().unwrap().player_state().unwrap().invincible());
        tick(&mut w, 0);
        assert!(!w.player().unwrap().player_state().unwrap().invincible());
    }

    #[test]
    fn held_direction_walks_at_move_interval() {
        let mut w = world_from(&["PPPPPPPP"], &["*......."], &[]);
        let input = TickInput { direction: Some(Direction::East), clicks: 0 };
        for _ in 0..8 {
            step(&mut w, input, &cfg(), Instant::now()).unwrap();
        }
        // Moves on the first tick, then once every player_move_interval.
        let interval = w.rules.player_move_interval as i32;
        assert_eq!(w.player_pos(), Some(Coord::new(1 + (8 - 1) / interval, 0)));
    }
    #[test]
    fn wall_clock_deadline_fires_while_paused() {
        let mut w = barnacle_world();
        let wall = BarnacleConfig { pause_suspends_deadline: false, ..cfg() };
        let later = Instant::now() + std::time::Duration::from_millis(wall.deadline_ms + 50);
        let events = paused_step(&mut w, &wall, later);
        assert!(events.iter().any(|e| matches!(e, GameEvent::ActorKilled { cause: DeathCause::Barnacle, .. })));
        assert_eq!(w.outcome, Some(Outcome::Lost(DeathCause::Barnacle)));
    }

    #[test]
    fn simulated_deadline_freezes_while_paused() {
        let mut w = barnacle_world();
        let later = Instant::now() + std::time::Duration::from_secs(3600);
        assert!(paused_step(&mut w, &cfg(), later).is_empty());
        assert!(w.minigame.is_some());
        assert!(w.outcome.is_none());
    }
}
