//! Test helpers: worlds from ASCII diagrams.

use crate::config::GameConfig;
use crate::sim::level::LevelData;
use crate::sim::world::World;

/// Build a world from tile, actor and item rows in level-grid characters
/// ('.' or '-' for empty). Rows may be ragged or missing. Actors face North
/// and fire `on_enter` on their starting tile; the clock is effectively
/// endless.
pub fn world_from(tiles: &[&str], actors: &[&str], items: &[&str]) -> World {
    let rows = |grid: &[&str]| grid.iter().map(|r| r.to_string()).collect::<Vec<_>>();
    let width = tiles.iter().chain(actors).chain(items).map(|r| r.len()).max().unwrap_or(0);
    let height = tiles.len().max(actors.len()).max(items.len());
    let data = LevelData {
        width: width as i32,
        height: height as i32,
        duration: 100_000,
        tiles: rows(tiles),
        actors: rows(actors),
        items: rows(items),
        ..LevelData::default()
    };
    let cfg = GameConfig::default();
    data.build(&cfg.rules, cfg.timing.tick_rate_ms).unwrap()
}
