/// Save files: the current world written back out in the level format.
///
/// A save is an ordinary level file, so loading one needs no special path:
///
///   - header: dimensions, remaining seconds (as the duration), field of view
///   - the three grids, `-` for empty cells
///   - button links, socket requirements, every actor's facing, boats
///   - the six inventory slots and the `ordinal, last` flags line
///
/// Transient per-tile counters (ice entry ticks, boat timers) are not
/// written; loading re-fires `on_enter` for every actor, which restores
/// pressed buttons, closed traps and boat riders.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::domain::coord::Coord;
use crate::domain::entity::INVENTORY_SLOTS;
use crate::domain::tile::TileKind;
use crate::error::{SessionError, SessionResult};
use crate::sim::world::World;

/// Level flags carried into the save.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SaveMeta {
    pub fov: f64,
    pub ordinal: Option<u32>,
    pub is_last: bool,
}

pub fn save_text(world: &World, meta: SaveMeta) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{},{}", world.width, world.height);
    let _ = writeln!(out, "{}", world.clock.remaining_secs());
    let _ = writeln!(out, "{}", meta.fov);

    out.push('\n');
    grid(&mut out, world, |at| world.tiles.get(at).map(|t| t.to_char()));
    out.push('\n');
    grid(&mut out, world, |at| world.actors.get(at).map(|a| a.kind.to_char()));
    out.push('\n');
    grid(&mut out, world, |at| world.items.get(at).map(|i| i.to_char()));

    for at in world.tiles.positions() {
        let Some(tile) = world.tiles.get(at) else { continue };
        if let TileKind::Button(button) = &tile.kind {
            for trap in &button.links {
                let _ = writeln!(out, "{at} -> {trap}");
            }
        }
    }
    for at in world.tiles.positions() {
        match world.tiles.get(at).map(|t| &t.kind) {
            Some(TileKind::ChipSocket { required }) => {
                let _ = writeln!(out, "{at} # {}", (*required).max(0));
            }
            Some(TileKind::BoatPath(boat)) if boat.boat => {
                let _ = writeln!(out, "{at} _{}", if boat.reversing { "?" } else { "" });
            }
            _ => {}
        }
    }
    for at in world.actors.positions() {
        if let Some(actor) = world.actors.get(at) {
            let _ = writeln!(out, "{at} @ {}", actor.facing.to_char());
        }
    }
    for (slot, count) in INVENTORY_SLOTS.iter().zip(world.inventory.to_slots()) {
        let _ = writeln!(out, "{slot} / {count}");
    }
    let ordinal = meta.ordinal.map_or_else(|| "null".to_string(), |n| n.to_string());
    let _ = writeln!(out, "{ordinal}, {}", u8::from(meta.is_last));
    out
}

fn grid(out: &mut String, world: &World, cell: impl Fn(Coord) -> Option<char>) {
    for y in 0..world.height {
        let row: String = (0..world.width).map(|x| cell(Coord::new(x, y)).unwrap_or('-')).collect();
        out.push_str(&row);
        out.push('\n');
    }
}

/// Write a save file, creating its directory if needed.
pub fn write_save(path: &Path, text: &str) -> SessionResult<()> {
    let io_err = |source| SessionError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, text).map_err(io_err)?;
    log::info!("saved {}", path.display());
    Ok(())
}

/// `<dir>/<level name>.sav`, with anything unfriendly in the name replaced.
pub fn save_path(dir: &Path, level_name: &str) -> PathBuf {
    let stem: String = level_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "level".to_string() } else { stem };
    dir.join(format!("{stem}.sav"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::coord::Direction;
    use crate::domain::tile::KeyColour;
    use crate::sim::level;
    use crate::sim::movement::player_step;

    const LEVEL: &str = "\
6,4
100
2.5

PCTSRE
PPPPPP
FFFPIP
WWWWWW

*-----
--#--%
------
------

-c-b--
----]-
------
------
(1,0) -> (2,0)
(3,0) # 3
(5,1) @ W
(1,2) _
c / 1
r / 1
2, 0
";

    fn rules() -> crate::config::RulesConfig {
        GameConfig::default().rules
    }

    fn snapshot(world: &World) -> Vec<String> {
        let text = save_text(world, SaveMeta::default());
        text.lines().skip(1).map(str::to_string).collect()
    }

    #[test]
    fn save_reloads_to_the_same_state() {
        let mut world = level::parse(LEVEL).unwrap().build(&rules(), 50).unwrap();
        // Onto the button (trap opens), picking up the chip on the way.
        player_step(&mut world, Direction::East).unwrap();
        let meta = SaveMeta { fov: 2.5, ordinal: Some(2), is_last: false };
        let text = save_text(&world, meta);

        let data = level::parse(&text).unwrap();
        assert_eq!(data.fov, 2.5);
        assert_eq!((data.ordinal, data.is_last), (Some(2), false));
        let reloaded = data.build(&rules(), 50).unwrap();

        assert_eq!(save_text(&reloaded, meta), text);
        assert_eq!(reloaded.inventory, world.inventory);
        assert_eq!(reloaded.inventory.chips, 2);
        assert_eq!(reloaded.inventory.keys(KeyColour::Red), 1);
        for at in world.tiles.positions() {
            assert_eq!(reloaded.tiles.get(at), world.tiles.get(at), "tile at {at}");
        }
        for at in world.actors.positions() {
            let (a, b) = (world.actors.get(at).unwrap(), reloaded.actors.get(at).unwrap());
            assert_eq!((a.kind, a.facing, a.trapped), (b.kind, b.facing, b.trapped));
        }
        assert_eq!(reloaded.items.positions(), world.items.positions());
    }

    #[test]
    fn header_and_metadata_blocks() {
        let world = level::parse(LEVEL).unwrap().build(&rules(), 50).unwrap();
        let text = save_text(&world, SaveMeta { fov: 2.5, ordinal: None, is_last: true });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(&lines[..4], &["6,4", "100", "2.5", ""]);
        assert_eq!(lines[4], "PCTSRE");
        assert_eq!(lines[9], "*-----");
        assert!(lines.contains(&"(1,0) -> (2,0)"));
        assert!(lines.contains(&"(3,0) # 3"));
        assert!(lines.contains(&"(5,1) @ W"));
        assert!(lines.contains(&"(0,0) @ N"));
        assert!(lines.contains(&"(1,2) _"));
        assert!(lines.contains(&"c / 1"));
        assert!(lines.contains(&"e / 0"));
        assert_eq!(lines.last(), Some(&"null, 1"));
    }

    #[test]
    fn remaining_time_becomes_the_duration() {
        let mut world = level::parse(LEVEL).unwrap().build(&rules(), 500).unwrap();
        for _ in 0..4 {
            world.clock.tick();
        }
        assert_eq!(snapshot(&world)[0], "98");
    }

    #[test]
    fn writes_into_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(&dir.path().join("saves"), "Cold Water");
        assert!(path.ends_with("saves/Cold_Water.sav"));
        write_save(&path, "1,1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1,1\n");
    }
}
