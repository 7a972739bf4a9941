/// Movement legality, driven by truth tables.
///
/// Pure functions over a read-only `MapView`. `plan_move` answers "may this
/// actor step that way, and what would happen if it did?" without touching
/// the world; `sim::movement::apply_effects` performs the answer. Monsters
/// probing future cells use the same view, so a probe never mutates.
///
/// ## Player
/// ┌─────────────────────────────────────┬──────────────────────────────┐
/// │ Condition (in order)                 │ Result                       │
/// ├─────────────────────────────────────┼──────────────────────────────┤
/// │ no tile / tile not walkable          │ DENY                         │
/// │ LockedDoor, no key of its colour     │ DENY                         │
/// │ LockedDoor, key held                 │ effect: UseKey               │
/// │ ChipSocket, chips < requirement      │ DENY (chips untouched)       │
/// │ ChipSocket, chips ≥ requirement      │ effect: SpendChips           │
/// │ Ice corner walled on entry side      │ DENY                         │
/// │ monster at target, invincible        │ DENY                         │
/// │ monster at target                    │ DENY + Kill(player)          │
/// │ Block at target, block can't move    │ DENY                         │
/// │ Block at target                      │ effect: Push                 │
/// │ any other actor at target            │ DENY                         │
/// │ item at target                       │ effect: Collect              │
/// │ otherwise                            │ ALLOW                        │
/// └─────────────────────────────────────┴──────────────────────────────┘
///
/// ## Block
/// │ player at target        │ ALLOW + Kill(player, Crush) │
/// │ walkable, actor-free, level running │ ALLOW           │
/// │ otherwise               │ DENY                        │
///
/// ## Bug / Frog
/// │ tile not walkable           │ DENY                          │
/// │ vulnerable player at target │ DENY + Kill(player)           │
/// │ any other actor             │ DENY                          │
/// │ otherwise                   │ ALLOW                         │
///
/// ## PinkBall
/// │ vulnerable player at target │ DENY + Kill(player, Bounced)  │
/// │ walkable, actor-free, not trapped │ ALLOW                   │
/// │ otherwise                   │ DENY                          │
///
/// Barnacles never move.

use super::coord::{Coord, Direction};
use super::entity::{Actor, ActorKind, Inventory, Item, PlayerState};
use super::layer::Layer;
use super::tile::{KeyColour, Tagged, Tile, TileKind};

/// Why a level was lost.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DeathCause {
    TimeOut,
    Drown,
    FrogKill,
    BugKill,
    Crush,
    Bounced,
    Barnacle,
    /// Terminal even when extra lives remain.
    ExtraLifeConsumed,
}

impl DeathCause {
    pub fn describe(self) -> &'static str {
        match self {
            DeathCause::TimeOut => "Out of time",
            DeathCause::Drown => "Drowned",
            DeathCause::FrogKill => "Eaten by a frog",
            DeathCause::BugKill => "Bitten by a bug",
            DeathCause::Crush => "Crushed by a block",
            DeathCause::Bounced => "Flattened by a pink ball",
            DeathCause::Barnacle => "Caught by a barnacle",
            DeathCause::ExtraLifeConsumed => "Out of lives",
        }
    }
}

/// Immutable view of the layers for rule queries.
#[derive(Clone, Copy)]
pub struct MapView<'a> {
    pub tiles: &'a Layer<Tile>,
    pub actors: &'a Layer<Actor>,
    pub items: &'a Layer<Item>,
    pub inventory: &'a Inventory,
    pub level_running: bool,
}

impl<'a> MapView<'a> {
    pub fn tile(&self, at: Coord) -> Option<&'a Tile> {
        self.tiles.get(at)
    }

    pub fn actor(&self, at: Coord) -> Option<&'a Actor> {
        self.actors.get(at)
    }

    /// Tile at `at` exists and `kind` may stand on it.
    pub fn walkable_for(&self, kind: &ActorKind, at: Coord) -> bool {
        self.tile(at).is_some_and(|t| kind.walkable(t.tile_type()))
    }

    /// Monster probe: walkable, and either empty or holding a player the
    /// monster could kill.
    pub fn traversable_for_monster(&self, kind: &ActorKind, at: Coord) -> bool {
        self.walkable_for(kind, at)
            && self.actor(at).map_or(true, Actor::is_vulnerable_player)
    }
}

/// A side effect that a legal (or fatal) move carries.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Effect {
    UseKey { door: Coord, colour: KeyColour },
    SpendChips { socket: Coord, amount: u32 },
    Push { block: Coord, dir: Direction },
    Collect { at: Coord, by: Coord },
    Kill { victim: Coord, cause: DeathCause },
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct MovePlan {
    pub legal: bool,
    pub effects: Vec<Effect>,
}

impl MovePlan {
    fn deny() -> Self {
        MovePlan { legal: false, effects: Vec::new() }
    }

    fn deny_with(effect: Effect) -> Self {
        MovePlan { legal: false, effects: vec![effect] }
    }

    fn allow(effects: Vec<Effect>) -> Self {
        MovePlan { legal: true, effects }
    }
}

/// Plan the actor at `from` stepping one cell towards `dir`.
pub fn plan_move(view: &MapView, from: Coord, dir: Direction) -> MovePlan {
    let Some(actor) = view.actor(from) else {
        return MovePlan::deny();
    };
    let to = dir.advance(from);
    match &actor.kind {
        ActorKind::Player(state) => plan_player(view, state, from, to, dir),
        ActorKind::Block => plan_block(view, to),
        ActorKind::Bug { .. } => plan_hunter(view, actor, to, DeathCause::BugKill),
        ActorKind::Frog => plan_hunter(view, actor, to, DeathCause::FrogKill),
        ActorKind::PinkBall => plan_pink_ball(view, actor, to),
        ActorKind::Barnacle => MovePlan::deny(),
    }
}

/// Cause of death when the player walks into `kind`.
pub fn contact_cause(kind: &ActorKind) -> Option<DeathCause> {
    match kind {
        ActorKind::Frog => Some(DeathCause::FrogKill),
        ActorKind::Bug { .. } => Some(DeathCause::BugKill),
        ActorKind::PinkBall => Some(DeathCause::Bounced),
        _ => None,
    }
}

fn plan_player(
    view: &MapView,
    state: &PlayerState,
    from: Coord,
    to: Coord,
    dir: Direction,
) -> MovePlan {
    let Some(tile) = view.tile(to) else {
        return MovePlan::deny();
    };
    if !ActorKind::Player(*state).walkable(tile.tile_type()) {
        return MovePlan::deny();
    }

    let mut effects = Vec::new();
    match &tile.kind {
        TileKind::LockedDoor(colour) => {
            if view.inventory.keys(*colour) == 0 {
                return MovePlan::deny();
            }
            effects.push(Effect::UseKey { door: to, colour: *colour });
        }
        TileKind::ChipSocket { required } => {
            if i64::from(view.inventory.chips) < i64::from(*required) {
                return MovePlan::deny();
            }
            let amount = (*required).max(0) as u32;
            effects.push(Effect::SpendChips { socket: to, amount });
        }
        TileKind::Ice(ice) if !ice.corner.admits(dir) => return MovePlan::deny(),
        _ => {}
    }

    if let Some(other) = view.actor(to) {
        if let Some(cause) = contact_cause(&other.kind) {
            if state.invincible() {
                return MovePlan::deny();
            }
            return MovePlan::deny_with(Effect::Kill { victim: from, cause });
        }
        match other.kind {
            ActorKind::Block => {
                if !plan_move(view, to, dir).legal {
                    return MovePlan::deny();
                }
                effects.push(Effect::Push { block: to, dir });
            }
            _ => return MovePlan::deny(),
        }
    }

    if view.items.contains(to) {
        effects.push(Effect::Collect { at: to, by: from });
    }
    MovePlan::allow(effects)
}

fn plan_block(view: &MapView, to: Coord) -> MovePlan {
    if let Some(other) = view.actor(to) {
        if other.is_player() {
            return MovePlan::allow(vec![Effect::Kill { victim: to, cause: DeathCause::Crush }]);
        }
        return MovePlan::deny();
    }
    if view.walkable_for(&ActorKind::Block, to) && view.level_running {
        MovePlan::allow(Vec::new())
    } else {
        MovePlan::deny()
    }
}

fn plan_hunter(view: &MapView, actor: &Actor, to: Coord, cause: DeathCause) -> MovePlan {
    if !view.walkable_for(&actor.kind, to) {
        return MovePlan::deny();
    }
    match view.actor(to) {
        Some(other) if other.is_vulnerable_player() => {
            MovePlan::deny_with(Effect::Kill { victim: to, cause })
        }
        Some(_) => MovePlan::deny(),
        None => MovePlan::allow(Vec::new()),
    }
}

fn plan_pink_ball(view: &MapView, actor: &Actor, to: Coord) -> MovePlan {
    if let Some(other) = view.actor(to) {
        if other.is_vulnerable_player() {
            return MovePlan::deny_with(Effect::Kill { victim: to, cause: DeathCause::Bounced });
        }
        return MovePlan::deny();
    }
    if view.walkable_for(&actor.kind, to) && !actor.trapped {
        MovePlan::allow(Vec::new())
    } else {
        MovePlan::deny()
    }
}
