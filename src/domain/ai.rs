/// Monster decision making.
///
/// Pure functions over `MapView`: they pick a direction, the step function
/// carries it out through the normal resolver. Nothing here mutates.
///
/// ## Bug: edge follower
/// Four probes relative to facing, with "side" the followed hand:
///   side, opposite side, front, and the cell diagonally behind the side.
///   1. side open, behind-side closed → turn toward the side
///   2. front closed, opposite open   → turn away from the side
///   3. front open                    → straight
///   4. otherwise                     → reverse
///
/// ## Frog: A* pursuer
/// Unit step cost, Euclidean heuristic, neighbours in N/E/S/W order, ties
/// broken by insertion order. Trap cells are never expanded. Nodes live in
/// an arena indexed by coordinate; the path is walked back iteratively
/// through parent indices to recover the first step.
///
/// ## Barnacle: row watcher
/// Sees the player when they share a row and no Wall tile or Block actor
/// lies strictly between them.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::coord::{Coord, Direction};
use super::entity::{Actor, ActorKind};
use super::rules::MapView;
use super::tile::{Tagged, TileType};

// ── Bug ──

pub fn bug_direction(view: &MapView, bug: &Actor, follow_left: bool) -> Direction {
    let facing = bug.facing;
    let side_dir = if follow_left { facing.turn_left() } else { facing.turn_right() };
    let open = |at: Coord| view.traversable_for_monster(&bug.kind, at);

    let front = facing.advance(bug.pos);
    let side = side_dir.advance(bug.pos);
    let other_side = side_dir.flip().advance(bug.pos);
    let behind_side = facing.flip().advance(side);

    if open(side) && !open(behind_side) {
        side_dir
    } else if !open(front) && open(other_side) {
        side_dir.flip()
    } else if open(front) {
        facing
    } else {
        facing.flip()
    }
}

// ── Frog ──

struct Node {
    at: Coord,
    g: u32,
    parent: Option<usize>,
}

/// Open-list entry: lowest f first, then earliest insertion.
struct Open {
    f: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for Open {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Open {}

impl PartialOrd for Open {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Open {
    // BinaryHeap is a max-heap; invert so the smallest f pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.total_cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Shortest path from `start` to `goal`, excluding `start`.
/// `goal` is reachable even if a player stands on it.
pub fn find_path(view: &MapView, mover: &ActorKind, start: Coord, goal: Coord) -> Option<Vec<Coord>> {
    let mut arena: Vec<Node> = vec![Node { at: start, g: 0, parent: None }];
    let mut index: HashMap<Coord, usize> = HashMap::from([(start, 0)]);
    let mut closed: Vec<bool> = vec![false];
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    open.push(Open { f: start.euclidean(goal), seq, node: 0 });

    while let Some(Open { node, .. }) = open.pop() {
        if closed[node] {
            continue;
        }
        closed[node] = true;
        let here = arena[node].at;
        if here == goal {
            return Some(reconstruct(&arena, node));
        }
        // Traps can be stepped onto as a goal but never searched through.
        if here != start && view.tile(here).map(Tagged::tile_type) == Some(TileType::Trap) {
            continue;
        }

        for dir in Direction::ALL {
            let next = dir.advance(here);
            if !view.walkable_for(mover, next) || (next != goal && view.actor(next).is_some()) {
                continue;
            }
            let g = arena[node].g + 1;
            let idx = match index.get(&next) {
                Some(&i) if closed[i] || arena[i].g <= g => continue,
                Some(&i) => {
                    arena[i].g = g;
                    arena[i].parent = Some(node);
                    i
                }
                None => {
                    arena.push(Node { at: next, g, parent: Some(node) });
                    closed.push(false);
                    index.insert(next, arena.len() - 1);
                    arena.len() - 1
                }
            };
            seq += 1;
            open.push(Open { f: f64::from(g) + next.euclidean(goal), seq, node: idx });
        }
    }
    None
}

fn reconstruct(arena: &[Node], mut node: usize) -> Vec<Coord> {
    let mut path = Vec::new();
    while let Some(parent) = arena[node].parent {
        path.push(arena[node].at);
        node = parent;
    }
    path.reverse();
    path
}

/// First step of the frog's path to the player, if one exists.
pub fn frog_direction(view: &MapView, frog: &Actor, player: Coord) -> Option<Direction> {
    let path = find_path(view, &frog.kind, frog.pos, player)?;
    let first = *path.first()?;
    Direction::between(frog.pos, first)
}

// ── Barnacle ──

pub fn barnacle_sees(view: &MapView, barnacle: Coord, player: Coord) -> bool {
    if barnacle.y != player.y || barnacle == player {
        return false;
    }
    let (lo, hi) = if barnacle.x < player.x {
        (barnacle.x, player.x)
    } else {
        (player.x, barnacle.x)
    };
    ((lo + 1)..hi).all(|x| {
        let at = Coord::new(x, barnacle.y);
        let wall = view.tile(at).map(Tagged::tile_type) == Some(TileType::Wall);
        let block = view.actor(at).is_some_and(|a| a.kind == ActorKind::Block);
        !wall && !block
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Inventory, Item};
    use crate::domain::layer::Layer;
    use crate::domain::tile::Tile;

    struct Map {
        tiles: Layer<Tile>,
        actors: Layer<Actor>,
        items: Layer<Item>,
        inventory: Inventory,
    }

    /// Tiles from level characters; actors from level characters, '.' empty.
    fn map_from(tiles: &[&str], actors: &[&str]) -> Map {
        let mut m = Map {
            tiles: Layer::new(),
            actors: Layer::new(),
            items: Layer::new(),
            inventory: Inventory::default(),
        };
        for (y, row) in tiles.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let c = Coord::new(x as i32, y as i32);
                if let Some(t) = Tile::from_char(ch, c) {
                    m.tiles.insert(c, t);
                }
            }
        }
        let mut id = 0;
        for (y, row) in actors.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let c = Coord::new(x as i32, y as i32);
                if let Some(kind) = ActorKind::from_char(ch) {
                    id += 1;
                    m.actors.insert(c, Actor::new(id, c, kind));
                }
            }
        }
        m
    }

    fn view(m: &Map) -> MapView<'_> {
        MapView {
            tiles: &m.tiles,
            actors: &m.actors,
            items: &m.items,
            inventory: &m.inventory,
            level_running: true,
        }
    }

    #[test]
    fn bug_turns_right_out_of_a_corner() {
        let m = map_from(
            &["WWWWW", "WPPPW", "WPPPW", "WPPPW", "WWWWW"],
            &[".....", ".$...", ".....", ".....", "....."],
        );
        let bug = *m.actors.get(Coord::new(1, 1)).unwrap();
        // Facing North into the top-left corner: wall ahead and to the left.
        assert_eq!(bug_direction(&view(&m), &bug, true), Direction::East);
    }

    #[test]
    fn bug_hugs_the_followed_side() {
        // Left-follower facing North with an opening on its left whose
        // behind-left cell is wall: it turns left into the opening.
        let m = map_from(
            &["WPPW", "WWPW", "WWPW"],
            &["....", "....", "..$."],
        );
        let mut bug = *m.actors.get(Coord::new(2, 2)).unwrap();
        bug.pos = Coord::new(2, 0);
        assert_eq!(bug_direction(&view(&m), &bug, true), Direction::West);
    }

    #[test]
    fn bug_reverses_in_dead_end() {
        let m = map_from(&["WWW", "WPW", "WPW"], &["...", "...", ".%."]);
        let mut bug = *m.actors.get(Coord::new(1, 2)).unwrap();
        bug.pos = Coord::new(1, 1);
        assert_eq!(bug_direction(&view(&m), &bug, false), Direction::South);
    }

    #[test]
    fn frog_path_in_open_field() {
        let rows = vec!["PPPPP"; 5];
        let m = map_from(&rows, &["^....", ".....", ".....", ".....", "....*"]);
        let frog = *m.actors.get(Coord::new(0, 0)).unwrap();
        let path = find_path(&view(&m), &frog.kind, frog.pos, Coord::new(4, 4)).unwrap();
        assert_eq!(path.len(), 8);
        assert_eq!(path.last(), Some(&Coord::new(4, 4)));
        let first = frog_direction(&view(&m), &frog, Coord::new(4, 4)).unwrap();
        assert!(matches!(first, Direction::East | Direction::South));
    }

    #[test]
    fn frog_routes_around_walls() {
        let m = map_from(
            &["PWP", "PWP", "PPP"],
            &["^.*", "...", "..."],
        );
        let frog = *m.actors.get(Coord::new(0, 0)).unwrap();
        let path = find_path(&view(&m), &frog.kind, frog.pos, Coord::new(2, 0)).unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(frog_direction(&view(&m), &frog, Coord::new(2, 0)), Some(Direction::South));
    }

    #[test]
    fn frog_never_searches_through_traps() {
        let m = map_from(&["PTP"], &["^.*"]);
        let frog = *m.actors.get(Coord::new(0, 0)).unwrap();
        assert!(find_path(&view(&m), &frog.kind, frog.pos, Coord::new(2, 0)).is_none());
        // ...but a player standing on a trap is still a goal.
        let m = map_from(&["PT"], &["^*"]);
        let frog = *m.actors.get(Coord::new(0, 0)).unwrap();
        assert_eq!(frog_direction(&view(&m), &frog, Coord::new(1, 0)), Some(Direction::East));
    }

    #[test]
    fn frog_blocked_by_actors() {
        let m = map_from(&["PPP"], &["^#*"]);
        let frog = *m.actors.get(Coord::new(0, 0)).unwrap();
        assert!(frog_direction(&view(&m), &frog, Coord::new(2, 0)).is_none());
    }

    #[test]
    fn barnacle_line_of_sight() {
        let m = map_from(&["PPPPP"], &[";...*"]);
        let v = view(&m);
        assert!(barnacle_sees(&v, Coord::new(0, 0), Coord::new(4, 0)));

        let m = map_from(&["PPWPP"], &[";...*"]);
        assert!(!barnacle_sees(&view(&m), Coord::new(0, 0), Coord::new(4, 0)));

        let m = map_from(&["PPPPP"], &[";.#.*"]);
        assert!(!barnacle_sees(&view(&m), Coord::new(0, 0), Coord::new(4, 0)));

        let m = map_from(&["PPPPP", "PPPPP"], &[";....", "....*"]);
        assert!(!barnacle_sees(&view(&m), Coord::new(0, 0), Coord::new(4, 1)));
    }
}
