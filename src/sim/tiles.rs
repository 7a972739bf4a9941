/// Action-tile hooks: enter, leave and tick.
///
/// ```text
///  Tile      on_enter                       on_leave            on_tick
///  Water     Block fills it / Player drowns  -                   -
///  Dirt      Player clears it to Path        -                   -
///  Exit      Player wins                     -                   -
///  Button    press, disable linked traps     release, enable     -
///  Trap      armed: catch the actor          forget occupant     -
///  Ice       Player/Block become the rider   untrap, clear rider slide / bounce
///  BoatPath  boat: board / no boat: Water    clear rider         relay the boat
/// ```

use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::{Actor, ActorId, ActorKind};
use crate::domain::rules::DeathCause;
use crate::domain::tile::{BoatState, IceState, TileKind, TileType};
use crate::error::{SessionError, SessionResult};
use crate::sim::event::{GameEvent, Outcome};
use crate::sim::movement::{check_move, kill, move_actor};
use crate::sim::world::World;

fn kind_mut(world: &mut World, at: Coord) -> Option<&mut TileKind> {
    world.tiles.get_mut(at).map(|t| &mut t.kind)
}

pub fn on_enter(world: &mut World, at: Coord, id: ActorId) -> SessionResult<()> {
    let Some(actor) = world.actors.get(at).copied() else {
        return Ok(());
    };
    let Some(kind) = world.tile_type_at(at) else {
        return Ok(());
    };
    match kind {
        TileType::Water => sink(world, at, &actor),
        TileType::Dirt if actor.is_player() => {
            world.set_tile_kind(at, TileKind::Path);
            world.emit(GameEvent::DirtCleared { at });
        }
        TileType::Exit if actor.is_player() => {
            let remaining_secs = world.clock.remaining_secs();
            world.finish(Outcome::Won { remaining_secs });
        }
        TileType::Button => press_button(world, at),
        TileType::Trap => {
            let caught = match kind_mut(world, at) {
                Some(TileKind::Trap(trap)) => trap.catch(id),
                _ => false,
            };
            if caught {
                world.set_trapped(id, true);
                world.emit(GameEvent::ActorTrapped { at });
            }
        }
        TileType::Ice if matches!(actor.kind, ActorKind::Player(_) | ActorKind::Block) => {
            if let Some(TileKind::Ice(ice)) = kind_mut(world, at) {
                ice.rider = Some(id);
                ice.entry_tick = ice.ticks;
            }
            world.set_trapped(id, true);
        }
        TileType::BoatPath => {
            let boarded = match kind_mut(world, at) {
                Some(TileKind::BoatPath(boat)) if boat.boat => {
                    boat.rider = Some(id);
                    true
                }
                _ => false,
            };
            if !boarded {
                sink(world, at, &actor);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Fails when the tile at `at` cannot be left: a Button that is not pressed.
/// Nothing is changed either way.
pub fn check_leave(world: &World, at: Coord) -> SessionResult<()> {
    match world.tiles.get(at).map(|t| &t.kind) {
        Some(TileKind::Button(button)) if !button.pressed => {
            Err(SessionError::ButtonNotPressed { at })
        }
        _ => Ok(()),
    }
}

/// Is actor `id` held in place by the tile at `at` (an armed Trap that
/// caught it, or Ice it is riding)?
pub fn holds(world: &World, at: Coord, id: ActorId) -> bool {
    match world.tiles.get(at).map(|t| &t.kind) {
        Some(TileKind::Trap(trap)) => trap.set && trap.occupant == Some(id),
        Some(TileKind::Ice(ice)) => ice.rider == Some(id),
        _ => false,
    }
}

pub fn on_leave(world: &mut World, at: Coord, id: ActorId) -> SessionResult<()> {
    match kind_mut(world, at) {
        Some(TileKind::Button(button)) => {
            if !button.pressed {
                return Err(SessionError::ButtonNotPressed { at });
            }
            button.pressed = false;
            let links = button.links.clone();
            world.emit(GameEvent::ButtonReleased { at });
            for trap_at in links {
                if let Some(TileKind::Trap(trap)) = kind_mut(world, trap_at) {
                    trap.enable();
                }
            }
        }
        Some(TileKind::Ice(ice)) => {
            if ice.rider == Some(id) {
                ice.rider = None;
            }
            world.set_trapped(id, false);
        }
        Some(TileKind::BoatPath(boat)) => {
            if boat.rider == Some(id) {
                boat.rider = None;
            }
        }
        Some(TileKind::Trap(trap)) => {
            if trap.occupant == Some(id) {
                trap.occupant = None;
                world.set_trapped(id, false);
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn on_tick(world: &mut World, at: Coord) -> SessionResult<()> {
    match world.tile_type_at(at) {
        Some(TileType::Ice) => tick_ice(world, at),
        Some(TileType::BoatPath) => tick_boat(world, at),
        _ => Ok(()),
    }
}

/// Water or a boatless BoatPath swallowing whatever walked in.
fn sink(world: &mut World, at: Coord, actor: &Actor) {
    match actor.kind {
        ActorKind::Block => {
            world.actors.remove(at);
            world.set_tile_kind(at, TileKind::Path);
            world.emit(GameEvent::WaterFilled { at });
        }
        ActorKind::Player(_) => kill(world, at, DeathCause::Drown),
        _ => {}
    }
}

fn press_button(world: &mut World, at: Coord) {
    let links = match kind_mut(world, at) {
        Some(TileKind::Button(button)) => {
            button.pressed = true;
            button.links.clone()
        }
        _ => return,
    };
    world.emit(GameEvent::ButtonPressed { at });
    for trap_at in links {
        let freed = match kind_mut(world, trap_at) {
            Some(TileKind::Trap(trap)) => trap.disable(),
            _ => None,
        };
        if let Some(freed) = freed {
            world.set_trapped(freed, false);
            world.emit(GameEvent::ActorFreed { at: trap_at });
        }
    }
}

fn tick_ice(world: &mut World, at: Coord) -> SessionResult<()> {
    let (rider, entry, now, corner) = match kind_mut(world, at) {
        Some(TileKind::Ice(IceState { corner, rider, entry_tick, ticks })) => {
            *ticks += 1;
            match rider {
                Some(r) => (*r, *entry_tick, *ticks, *corner),
                None => return Ok(()),
            }
        }
        _ => return Ok(()),
    };

    let Some(actor) = world.actors.get(at).copied().filter(|a| a.id == rider) else {
        if let Some(TileKind::Ice(ice)) = kind_mut(world, at) {
            ice.rider = None;
        }
        return Ok(());
    };

    let mut interval = world.rules.ice_slide_interval;
    if matches!(actor.facing, Direction::East | Direction::South) {
        interval += 1;
    }
    if now - entry < interval {
        return Ok(());
    }

    for dir in [corner.redirect(actor.facing), actor.facing.flip()] {
        if check_move(world, at, dir)? {
            if let Some(a) = world.actors.get_mut(at) {
                a.facing = dir;
            }
            move_actor(world, at, dir)?;
            return Ok(());
        }
        if world.actors.get(at).map(|a| a.id) != Some(rider) {
            break;
        }
    }
    Ok(())
}

fn tick_boat(world: &mut World, at: Coord) -> SessionResult<()> {
    let interval = world.rules.boat_move_interval;
    let current = world.tick;
    let state: BoatState = match kind_mut(world, at) {
        Some(TileKind::BoatPath(boat)) if boat.boat && boat.arrived_tick != current => {
            boat.ticks_since_move += 1;
            if boat.ticks_since_move < interval {
                return Ok(());
            }
            boat.clone()
        }
        _ => return Ok(()),
    };

    // End of the line: turn round.
    let mut reversing = state.reversing;
    let mut dir = state.travel();
    if boat_path(world, dir.advance(at)).is_none() {
        reversing = !reversing;
        dir = dir.flip();
        if let Some(TileKind::BoatPath(boat)) = kind_mut(world, at) {
            boat.reversing = reversing;
        }
    }
    let dest = dir.advance(at);
    if boat_path(world, dest) != Some(false) || world.actors.contains(dest) {
        return Ok(());
    }

    if let Some(TileKind::BoatPath(next)) = kind_mut(world, dest) {
        next.move_boat_to(reversing, current);
    }
    let rider = match kind_mut(world, at) {
        Some(TileKind::BoatPath(boat)) => boat.move_boat_away(),
        _ => None,
    };
    world.emit(GameEvent::BoatMoved { from: at, to: dest });
    if let Some(rider) = rider {
        if world.actors.get(at).is_some_and(|a| a.id == rider) {
            move_actor(world, at, dir)?;
        }
    }
    Ok(())
}

/// `Some(has_boat)` for a BoatPath tile, `None` for anything else.
fn boat_path(world: &World, at: Coord) -> Option<bool> {
    match world.tiles.get(at).map(|t| &t.kind) {
        Some(TileKind::BoatPath(b)) => Some(b.boat),
        _ => None,
    }
}
