/// Level loader with index support.
///
/// ## Sources (priority order):
///   1. `level-index.txt` in the levels directory
///   2. Built-in embedded levels
///
/// ## Index format (`level-index.txt`):
///   ```text
///   level-1.txt, First Steps
///   level-2.txt, Cold Water
///   ```
/// One `path, name` per line; paths are relative to the index. The last
/// entry is flagged as the last level.
///
/// ## Level format:
///   ```text
///   width,height
///   duration (seconds)
///   field of view (float, carried through to saves)
///   <blank>
///   <height rows: tile grid>
///   <blank>
///   <height rows: actor grid>
///   <blank>
///   <height rows: item grid>
///   <metadata lines, any order>
///   ```
///
/// ## Metadata (whole-line matches; anything else is ignored):
///   `(x,y) -> (x,y)`   button to trap link
///   `(x,y) # n`        chip socket requirement
///   `(x,y) @ D`        actor facing, D in N E S W
///   `s / n`            inventory slot, s in c r g y b e
///   `(x,y) _`          boat on a BoatPath, `_?` when reversing
///   `n, 0|1`           level ordinal and last-level flag (`null` ordinal
///                      for custom levels)
///
/// ## Grid legend:
///   tiles   P D W E C T O S R G Y B I U J K L A F H M
///   actors  * # @ % $ ^ ;
///   items   c r g y b ] v x +
///   `-` or any unknown character is an empty cell; short rows end early.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::RulesConfig;
use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::{ActorKind, Inventory, Item};
use crate::domain::tile::{Tile, TileKind, TileType};
use crate::error::{LevelError, SessionResult};
use crate::sim::clock::LevelClock;
use crate::sim::tiles;
use crate::sim::world::World;

pub const INDEX_FILE: &str = "level-index.txt";

/// A parsed level file: the three grids plus the side tables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelData {
    pub width: i32,
    pub height: i32,
    pub duration: u32,
    pub fov: f64,
    pub tiles: Vec<String>,
    pub actors: Vec<String>,
    pub items: Vec<String>,
    pub links: Vec<(Coord, Coord)>,
    pub sockets: HashMap<Coord, i32>,
    pub facings: HashMap<Coord, Direction>,
    /// BoatPath tiles holding a boat; the value is the reversing flag.
    pub boats: HashMap<Coord, bool>,
    pub inventory: Inventory,
    pub ordinal: Option<u32>,
    pub is_last: bool,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Read and parse a level file. A missing file is `NotFound`, never `Io`.
pub fn load_from_path(path: &Path) -> Result<LevelData, LevelError> {
    parse(&read_level_text(path)?)
}

pub fn read_level_text(path: &Path) -> Result<String, LevelError> {
    if !path.is_file() {
        return Err(LevelError::NotFound { path: path.to_path_buf() });
    }
    std::fs::read_to_string(path).map_err(|source| LevelError::Io { path: path.to_path_buf(), source })
}

pub fn parse(text: &str) -> Result<LevelData, LevelError> {
    let mut lines = Lines { iter: text.lines(), line: 0 };
    let mut data = LevelData::default();

    let dims = lines.next()?;
    let (w, h) = dims
        .split_once(',')
        .ok_or_else(|| LevelError::parse(lines.line, "expected `width,height`"))?;
    data.width = number(w, lines.line, "a width")?;
    data.height = number(h, lines.line, "a height")?;
    if data.width <= 0 || data.height <= 0 {
        return Err(LevelError::parse(lines.line, "dimensions must be positive"));
    }
    data.duration = number(lines.next()?, lines.line, "a duration")?;
    data.fov = number(lines.next()?, lines.line, "a field of view")?;

    lines.next()?;
    data.tiles = lines.grid(data.height)?;
    lines.next()?;
    data.actors = lines.grid(data.height)?;
    lines.next()?;
    data.items = lines.grid(data.height)?;

    for raw in lines.iter.by_ref() {
        apply_metadata(&mut data, raw.trim_end());
    }
    Ok(data)
}

impl LevelData {
    /// Build a fresh world. Spawned actors fire `on_enter` on the tile they
    /// start on, so buttons start pressed and armed traps start closed.
    pub fn build(&self, rules: &RulesConfig, tick_rate_ms: u64) -> SessionResult<World> {
        let clock = LevelClock::new(self.duration, tick_rate_ms);
        let mut world = World::new(self.width, self.height, clock, rules.clone());
        world.inventory = self.inventory;

        for (at, ch) in cells(&self.tiles, self.width, self.height) {
            let Some(mut tile) = Tile::from_char(ch, at) else {
                continue;
            };
            match &mut tile.kind {
                TileKind::ChipSocket { required } => {
                    if let Some(&n) = self.sockets.get(&at) {
                        *required = n;
                    }
                }
                TileKind::BoatPath(boat) => {
                    if let Some(&reversing) = self.boats.get(&at) {
                        boat.move_boat_to(reversing, 0);
                    }
                }
                _ => {}
            }
            world.place_tile(tile);
        }

        for &(button, trap) in &self.links {
            if world.tile_type_at(trap) != Some(TileType::Trap) {
                log::warn!("ignoring link {button} -> {trap}: target is not a trap");
                continue;
            }
            if let Some(TileKind::Button(b)) = world.tiles.get_mut(button).map(|t| &mut t.kind) {
                b.links.push(trap);
            }
        }

        for (at, ch) in cells(&self.items, self.width, self.height) {
            if let Some(item) = Item::from_char(ch, at) {
                world.items.insert(at, item);
            }
        }

        let mut spawned = Vec::new();
        for (at, ch) in cells(&self.actors, self.width, self.height) {
            if let Some(kind) = ActorKind::from_char(ch) {
                let facing = self.facings.get(&at).copied().unwrap_or(Direction::North);
                spawned.push((at, world.spawn(at, kind, facing)));
            }
        }
        for (at, id) in spawned {
            tiles::on_enter(&mut world, at, id)?;
        }
        world.take_events();
        Ok(world)
    }
}

// ══════════════════════════════════════════════════════════════
// Parsing helpers
// ══════════════════════════════════════════════════════════════

/// Line reader that knows its 1-based position.
struct Lines<'a> {
    iter: std::str::Lines<'a>,
    line: usize,
}

impl<'a> Lines<'a> {
    fn next(&mut self) -> Result<&'a str, LevelError> {
        self.line += 1;
        self.iter.next().ok_or(LevelError::UnexpectedEof { line: self.line })
    }

    fn grid(&mut self, height: i32) -> Result<Vec<String>, LevelError> {
        (0..height).map(|_| self.next().map(str::to_string)).collect()
    }
}

fn number<T: FromStr>(text: &str, line: usize, what: &str) -> Result<T, LevelError> {
    let text = text.trim();
    text.parse()
        .map_err(|_| LevelError::parse(line, format!("expected {what}, found `{text}`")))
}

fn cells(rows: &[String], width: i32, height: i32) -> impl Iterator<Item = (Coord, char)> + '_ {
    rows.iter().take(height.max(0) as usize).enumerate().flat_map(move |(y, row)| {
        row.chars()
            .take(width.max(0) as usize)
            .enumerate()
            .map(move |(x, c)| (Coord::new(x as i32, y as i32), c))
    })
}

fn digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `(x,y)` or `(x, y)` at the start of `s`; returns the rest.
fn coord_prefix(s: &str) -> Option<(Coord, &str)> {
    let inner = s.strip_prefix('(')?;
    let (body, rest) = inner.split_once(')')?;
    let (x, y) = body.split_once(',')?;
    let x = digits(x)?;
    let y = digits(y.trim_start_matches(' '))?;
    Some((Coord::new(x as i32, y as i32), rest))
}

fn apply_metadata(data: &mut LevelData, line: &str) {
    if let Some((at, rest)) = coord_prefix(line) {
        if let Some((trap, "")) = rest.strip_prefix(" -> ").and_then(coord_prefix) {
            data.links.push((at, trap));
        } else if let Some(n) = rest.strip_prefix(" # ").and_then(digits) {
            data.sockets.insert(at, n as i32);
        } else if let Some(dir) = rest.strip_prefix(" @ ").and_then(single_char).and_then(Direction::from_char) {
            data.facings.insert(at, dir);
        } else if rest == " _" || rest == " _?" {
            data.boats.insert(at, rest.ends_with('?'));
        }
        return;
    }

    if let Some((slot, count)) = line.split_once('/') {
        let slot = single_char(slot.trim_end_matches(' '));
        let count = digits(count.trim_start_matches(' '));
        if let (Some(slot), Some(count)) = (slot, count) {
            if "crygbe".contains(slot) {
                data.inventory.set_slot(slot, count);
            }
        }
        return;
    }

    if let Some((ordinal, last)) = line.split_once(',') {
        let last = last.trim_start_matches(' ');
        if last != "0" && last != "1" {
            return;
        }
        let ordinal = match ordinal {
            "null" => None,
            n => match digits(n) {
                Some(n) => Some(n),
                None => return,
            },
        };
        data.ordinal = ordinal;
        data.is_last = last == "1";
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

// ══════════════════════════════════════════════════════════════
// Level index
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum LevelSource {
    File(PathBuf),
    Embedded(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    /// 1-based position in the index.
    pub ordinal: u32,
    pub name: String,
    pub source: LevelSource,
    pub is_last: bool,
    pub duration_secs: Option<u32>,
}

impl IndexEntry {
    pub fn duration_label(&self) -> String {
        self.duration_secs.map_or_else(|| "--:--".to_string(), format_duration)
    }

    pub fn read(&self) -> Result<LevelData, LevelError> {
        match &self.source {
            LevelSource::File(path) => load_from_path(path),
            LevelSource::Embedded(i) => match EMBEDDED.get(*i) {
                Some((_, rows)) => parse(&rows.join("\n")),
                None => Err(LevelError::NotFound { path: PathBuf::from(format!("<embedded {i}>")) }),
            },
        }
    }
}

/// `MM:SS`.
pub fn format_duration(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Entries from `levels_dir/level-index.txt`, or the embedded levels when
/// there is no usable index.
pub fn load_index(levels_dir: &Path) -> Vec<IndexEntry> {
    let path = levels_dir.join(INDEX_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            let entries = parse_index(&text, levels_dir);
            if !entries.is_empty() {
                log::info!("{} levels listed in {}", entries.len(), path.display());
                return entries;
            }
            log::warn!("{} lists no levels; using built-in levels", path.display());
        }
        Err(e) => log::warn!("could not read {}: {e}; using built-in levels", path.display()),
    }
    embedded_index()
}

pub fn parse_index(text: &str, base: &Path) -> Vec<IndexEntry> {
    let pairs: Vec<(&str, &str)> = text
        .lines()
        .filter_map(|line| {
            let (path, name) = line.split_once(',')?;
            let (path, name) = (path.trim(), name.trim());
            (!path.is_empty() && !name.is_empty()).then_some((path, name))
        })
        .collect();
    let count = pairs.len();
    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (file, name))| {
            let path = base.join(file);
            IndexEntry {
                ordinal: i as u32 + 1,
                name: name.to_string(),
                duration_secs: peek_duration(&path),
                source: LevelSource::File(path),
                is_last: i + 1 == count,
            }
        })
        .collect()
}

fn peek_duration(path: &Path) -> Option<u32> {
    let text = std::fs::read_to_string(path).ok()?;
    text.lines().nth(1)?.trim().parse().ok()
}

pub fn embedded_index() -> Vec<IndexEntry> {
    EMBEDDED
        .iter()
        .enumerate()
        .map(|(i, (name, rows))| IndexEntry {
            ordinal: i as u32 + 1,
            name: name.to_string(),
            source: LevelSource::Embedded(i),
            is_last: i + 1 == EMBEDDED.len(),
            duration_secs: rows.get(1).and_then(|d| d.trim().parse().ok()),
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: [(&str, &[&str]); 3] = [
    ("First Steps", &[
        "9,7",
        "120",
        "4.5",
        "",
        "WWWWWWWWW",
        "WPPPPPPPW",
        "WPPWRWPPW",
        "WPPWEWPPW",
        "WPPWSWPPW",
        "WPPPPPPPW",
        "WWWWWWWWW",
        "",
        "---------",
        "-*-------",
        "---------",
        "---------",
        "---------",
        "---@-----",
        "---------",
        "",
        "---------",
        "-------r-",
        "---------",
        "---------",
        "---------",
        "-c-----c-",
        "---------",
        "(4,4) # 2",
        "(3,5) @ E",
    ]),
    ("Cold Water", &[
        "11,7",
        "150",
        "4.5",
        "",
        "WWWWWWWWWWW",
        "WPPPPIIIPPW",
        "WPPPPPPPPPW",
        "WPCPPOPPTPW",
        "WPPPPOPPPPW",
        "WPPPPOPPPEW",
        "WWWWWWWWWWW",
        "",
        "-----------",
        "-*---------",
        "-----------",
        "-----------",
        "----#------",
        "-----------",
        "-----------",
        "",
        "-----------",
        "-----------",
        "---+-------",
        "-----------",
        "-------c---",
        "-----------",
        "-----------",
        "(2,3) -> (8,3)",
    ]),
    ("Harbour", &[
        "10,6",
        "180",
        "4.5",
        "",
        "WWWWWWWWWW",
        "WPPPPPPPPW",
        "WPWWWWWWWW",
        "WPFFFFFFEW",
        "WPPPPPPPWW",
        "WWWWWWWWWW",
        "",
        "----------",
        "-----#--;-",
        "----------",
        "----------",
        "-*--------",
        "----------",
        "",
        "----------",
        "----------",
        "----------",
        "----------",
        "------x---",
        "----------",
        "(2,3) _",
    ]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::tile::KeyColour;
    use std::io::Write;

    const SAMPLE: &str = "\
4,3
90
3.5

PCTS
PWIF
EPPR

*---
---%
----

c---
-r--
---]
(1,0) -> (2,0)
(3,0) # 4
(3,1) @ W
(3,1) _?
c / 2
b / 1
7, 1
";

    #[test]
    fn parses_header_grids_and_metadata() {
        let data = parse(SAMPLE).unwrap();
        assert_eq!((data.width, data.height, data.duration), (4, 3, 90));
        assert_eq!(data.fov, 3.5);
        assert_eq!(data.tiles[1], "PWIF");
        assert_eq!(data.links, vec![(Coord::new(1, 0), Coord::new(2, 0))]);
        assert_eq!(data.sockets.get(&Coord::new(3, 0)), Some(&4));
        assert_eq!(data.facings.get(&Coord::new(3, 1)), Some(&Direction::West));
        assert_eq!(data.boats.get(&Coord::new(3, 1)), Some(&true));
        assert_eq!(data.inventory.chips, 2);
        assert_eq!(data.inventory.keys(KeyColour::Blue), 1);
        assert_eq!((data.ordinal, data.is_last), (Some(7), true));
    }

    #[test]
    fn builds_world_with_side_tables() {
        let world = parse(SAMPLE).unwrap().build(&GameConfig::default().rules, 50).unwrap();
        assert_eq!(
            world.tiles.get(Coord::new(3, 0)).unwrap().kind,
            TileKind::ChipSocket { required: 4 }
        );
        match &world.tiles.get(Coord::new(1, 0)).unwrap().kind {
            TileKind::Button(b) => assert_eq!(b.links, vec![Coord::new(2, 0)]),
            other => panic!("expected button, got {other:?}"),
        }
        match &world.tiles.get(Coord::new(3, 1)).unwrap().kind {
            TileKind::BoatPath(b) => assert!(b.boat && b.reversing),
            other => panic!("expected boat path, got {other:?}"),
        }
        assert_eq!(world.actors.get(Coord::new(3, 1)).unwrap().facing, Direction::West);
        assert_eq!(world.actors.get(Coord::new(0, 0)).unwrap().facing, Direction::North);
        assert_eq!(world.items.len(), 3);
        assert_eq!(world.clock.remaining_secs(), 90);
        assert!(world.outcome.is_none());
    }

    #[test]
    fn links_only_reach_traps() {
        let text = SAMPLE.replace("(1,0) -> (2,0)", "(1,0) -> (0,0)");
        let world = parse(&text).unwrap().build(&GameConfig::default().rules, 50).unwrap();
        match &world.tiles.get(Coord::new(1, 0)).unwrap().kind {
            TileKind::Button(b) => assert!(b.links.is_empty()),
            other => panic!("expected button, got {other:?}"),
        }
    }

    #[test]
    fn short_rows_and_unknown_chars_are_empty() {
        let text = "3,2\n10\n1.0\n\nPZ\nPPP\n\n*\n---\n\n-q-\n\n";
        let world = parse(text).unwrap().build(&GameConfig::default().rules, 50).unwrap();
        assert!(world.tiles.get(Coord::new(1, 0)).is_none());
        assert!(world.tiles.get(Coord::new(2, 0)).is_none());
        assert_eq!(world.tiles.len(), 4);
        assert!(world.items.is_empty());
        assert_eq!(world.actors.len(), 1);
    }

    #[test]
    fn bad_numbers_name_their_line() {
        let err = parse("4,x\n10\n1\n").unwrap_err();
        assert!(matches!(err, LevelError::Parse { line: 1, .. }));
        let err = parse("4,3\nsoon\n1\n").unwrap_err();
        assert!(matches!(err, LevelError::Parse { line: 2, .. }));
        let err = parse("4,3\n10\nwide\n").unwrap_err();
        assert!(matches!(err, LevelError::Parse { line: 3, .. }));
    }

    #[test]
    fn truncated_file_is_an_early_eof() {
        let err = parse("2,2\n10\n1\n\nPP\nPP\n\n*-\n").unwrap_err();
        assert!(matches!(err, LevelError::UnexpectedEof { line: 9 }));
    }

    #[test]
    fn unmatched_metadata_is_ignored() {
        let text = format!("{SAMPLE}hello\n(1,1) ? 3\nq / 4\n5, 2\n(a,b) # 1\n");
        let data = parse(&text).unwrap();
        assert_eq!(data.sockets.len(), 1);
        assert_eq!((data.ordinal, data.is_last), (Some(7), true));
    }

    #[test]
    fn null_ordinal_for_custom_levels() {
        let text = SAMPLE.replace("7, 1", "null,0");
        let data = parse(&text).unwrap();
        assert_eq!((data.ordinal, data.is_last), (None, false));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, LevelError::NotFound { .. }));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let data = load_from_path(file.path()).unwrap();
        assert_eq!(data.width, 4);
    }

    #[test]
    fn index_flags_last_entry_and_reads_durations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), SAMPLE).unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE),
            "a.txt, Alpha\n\nmissing.txt,  Beta\nnot an entry\n",
        )
        .unwrap();
        let index = load_index(dir.path());
        assert_eq!(index.len(), 2);
        assert_eq!(index[0].name, "Alpha");
        assert_eq!(index[0].duration_label(), "01:30");
        assert!(!index[0].is_last);
        assert_eq!(index[1].ordinal, 2);
        assert!(index[1].is_last);
        assert_eq!(index[1].duration_label(), "--:--");
        assert!(matches!(index[1].read(), Err(LevelError::NotFound { .. })));
        assert_eq!(index[0].read().unwrap().duration, 90);
    }

    #[test]
    fn missing_index_falls_back_to_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let index = load_index(dir.path());
        assert_eq!(index, embedded_index());
        assert!(index.last().unwrap().is_last);
    }

    #[test]
    fn embedded_levels_load() {
        let rules = GameConfig::default().rules;
        for entry in embedded_index() {
            let data = entry.read().unwrap();
            let world = data.build(&rules, 50).unwrap();
            assert!(world.player_pos().is_some(), "{} has a player", entry.name);
            assert!(world.outcome.is_none());
        }
    }

    #[test]
    fn durations_format_as_minutes_and_seconds() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(95), "01:35");
        assert_eq!(format_duration(600), "10:00");
    }
}
