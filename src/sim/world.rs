/// World: the complete state of a loaded level.
///
/// ## Layers
///
/// Three sparse layers over one coordinate space:
///   - `tiles` : terrain; a missing tile is a blocking void
///   - `actors`: one mobile occupant per coordinate
///   - `items` : one pickup per coordinate
///
/// Everything the rules touch lives here: inventory, level clock, the
/// recorded outcome, the frog's RNG and an active barnacle minigame.
/// There is no global state; the session owns exactly one `World`.
///
/// All actor relocation goes through `sim::movement::move_actor`, which
/// keeps the layer key and `Actor::pos` in agreement.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::RulesConfig;
use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::{Actor, ActorId, ActorKind, Inventory, Item};
use crate::domain::layer::Layer;
use crate::domain::tile::{Tagged, Tile, TileKind, TileType};
use crate::sim::clock::LevelClock;
use crate::sim::event::{GameEvent, Outcome};
use crate::sim::minigame::Minigame;

pub struct World {
    pub width: i32,
    pub height: i32,
    pub tiles: Layer<Tile>,
    pub actors: Layer<Actor>,
    pub items: Layer<Item>,
    pub inventory: Inventory,
    pub clock: LevelClock,
    pub rules: RulesConfig,
    /// Ticks stepped since load.
    pub tick: u64,
    /// Blocks only move while the level is live.
    pub level_running: bool,
    /// First terminal outcome of the current tick, if any.
    pub outcome: Option<Outcome>,
    pub events: Vec<GameEvent>,
    pub minigame: Option<Minigame>,
    /// Barnacle asking to start a minigame; picked up by the step.
    pub barnacle_request: Option<Coord>,
    pub rng: Pcg32,
    next_id: ActorId,
}

impl World {
    pub fn new(width: i32, height: i32, clock: LevelClock, rules: RulesConfig) -> Self {
        let rng = Pcg32::seed_from_u64(rules.frog_seed);
        World {
            width,
            height,
            tiles: Layer::new(),
            actors: Layer::new(),
            items: Layer::new(),
            inventory: Inventory::default(),
            clock,
            rules,
            tick: 0,
            level_running: true,
            outcome: None,
            events: Vec::new(),
            minigame: None,
            barnacle_request: None,
            rng,
            next_id: 1,
        }
    }

    // ── Tiles ──

    pub fn tile_type_at(&self, at: Coord) -> Option<TileType> {
        self.tiles.type_at(at)
    }

    pub fn place_tile(&mut self, tile: Tile) {
        self.tiles.insert(tile.pos, tile);
    }

    /// Replace the terrain at `at`, e.g. Water → Path.
    pub fn set_tile_kind(&mut self, at: Coord, kind: TileKind) {
        self.tiles.insert(at, Tile::new(at, kind));
    }

    // ── Actors ──

    /// Add an actor with a fresh id. The caller fires `on_enter` if needed.
    pub fn spawn(&mut self, pos: Coord, kind: ActorKind, facing: Direction) -> ActorId {
        let id = self.next_id;
        self.next_id += 1;
        let mut actor = Actor::new(id, pos, kind);
        actor.facing = facing;
        self.actors.insert(pos, actor);
        id
    }

    pub fn actor_pos(&self, id: ActorId) -> Option<Coord> {
        self.actors.values().find(|a| a.id == id).map(|a| a.pos)
    }

    pub fn actor_by_id_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        let pos = self.actor_pos(id)?;
        self.actors.get_mut(pos)
    }

    pub fn set_trapped(&mut self, id: ActorId, trapped: bool) {
        if let Some(actor) = self.actor_by_id_mut(id) {
            actor.trapped = trapped;
        }
    }

    pub fn player_pos(&self) -> Option<Coord> {
        self.actors.find(TileType::Player).first().copied()
    }

    pub fn player(&self) -> Option<&Actor> {
        self.actors.get(self.player_pos()?)
    }

    pub fn player_mut(&mut self) -> Option<&mut Actor> {
        let pos = self.player_pos()?;
        self.actors.get_mut(pos)
    }

    // ── Outcome / events ──

    pub fn emit(&mut self, event: GameEvent) {
        log::debug!("{event:?}");
        self.events.push(event);
    }

    /// Record a terminal outcome. Only the first one of a tick counts.
    pub fn finish(&mut self, outcome: Outcome) {
        if self.outcome.is_none() {
            log::info!("level outcome: {outcome:?}");
            self.outcome = Some(outcome);
        }
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
