/// Actors, items and the player's inventory.
///
/// Actors are the mobile occupants of the actor layer. Every actor carries
/// the common state (id, position, facing, trapped flag, own tick counter);
/// kind-specific state lives in `ActorKind`. Behaviour is dispatched with
/// exhaustive matches in `domain::ai` and `sim::movement`.

use super::coord::{Coord, Direction};
use super::tile::{KeyColour, TileType, Tagged};

/// Stable identity of an actor for the lifetime of a loaded level.
/// Tiles that remember an occupant (Ice, BoatPath, Trap) store this.
pub type ActorId = u32;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PlayerState {
    /// Player tick at which the last self-initiated move happened.
    pub last_move: Option<u64>,
    pub speed_ticks: u32,
    pub invincible_ticks: u32,
}

impl PlayerState {
    pub fn invincible(&self) -> bool {
        self.invincible_ticks > 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActorKind {
    Player(PlayerState),
    Block,
    PinkBall,
    /// `follow_left`: keeps the wall on its left-hand side.
    Bug { follow_left: bool },
    Frog,
    Barnacle,
}

impl ActorKind {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '*' => Some(ActorKind::Player(PlayerState::default())),
            '#' => Some(ActorKind::Block),
            '@' => Some(ActorKind::PinkBall),
            '%' => Some(ActorKind::Bug { follow_left: false }),
            '$' => Some(ActorKind::Bug { follow_left: true }),
            '^' => Some(ActorKind::Frog),
            ';' => Some(ActorKind::Barnacle),
            _ => None,
        }
    }

    pub fn to_char(&self) -> char {
        match self {
            ActorKind::Player(_) => '*',
            ActorKind::Block => '#',
            ActorKind::PinkBall => '@',
            ActorKind::Bug { follow_left: false } => '%',
            ActorKind::Bug { follow_left: true } => '$',
            ActorKind::Frog => '^',
            ActorKind::Barnacle => ';',
        }
    }

    /// Tiles this kind may stand on. Special cases (boatless BoatPath,
    /// corner ice) are refined by the resolver.
    pub fn walkable(&self, tile: TileType) -> bool {
        use TileType::*;
        match self {
            ActorKind::Player(_) => matches!(
                tile,
                Path | Button | LockedDoor | ChipSocket | Dirt | Exit | Trap | Water | Ice | BoatPath
            ),
            ActorKind::Block => {
                matches!(tile, Path | Button | Trap | Water | Dirt | Ice | BoatPath)
            }
            ActorKind::PinkBall | ActorKind::Bug { .. } | ActorKind::Frog => {
                matches!(tile, Path | Button | Trap)
            }
            // A barnacle never moves; its set documents where it may sit.
            ActorKind::Barnacle => matches!(tile, Path | Wall | Water),
        }
    }

    /// Kinds whose touch kills the player.
    pub fn is_monster(&self) -> bool {
        matches!(self, ActorKind::PinkBall | ActorKind::Bug { .. } | ActorKind::Frog)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Actor {
    pub id: ActorId,
    pub pos: Coord,
    pub facing: Direction,
    pub trapped: bool,
    /// Ticks this actor has seen; move intervals are measured against it.
    pub ticks: u64,
    pub kind: ActorKind,
}

impl Actor {
    pub fn new(id: ActorId, pos: Coord, kind: ActorKind) -> Self {
        Actor { id, pos, facing: Direction::North, trapped: false, ticks: 0, kind }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, ActorKind::Player(_))
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.kind {
            ActorKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            ActorKind::Player(p) => Some(p),
            _ => None,
        }
    }

    /// A player that monsters can currently kill.
    pub fn is_vulnerable_player(&self) -> bool {
        self.player_state().is_some_and(|p| !p.invincible())
    }

    pub fn sprite(&self) -> &'static str {
        match self.kind {
            ActorKind::Player(p) if p.invincible() => "player-shielded",
            ActorKind::Player(_) => "player",
            ActorKind::Block => "block",
            ActorKind::PinkBall => "pink-ball",
            ActorKind::Bug { .. } => "bug",
            ActorKind::Frog => "frog",
            ActorKind::Barnacle => "barnacle",
        }
    }
}

impl Tagged for Actor {
    fn tile_type(&self) -> TileType {
        match self.kind {
            ActorKind::Player(_) => TileType::Player,
            ActorKind::Block => TileType::Block,
            ActorKind::PinkBall => TileType::PinkBall,
            ActorKind::Bug { .. } => TileType::Bug,
            ActorKind::Frog => TileType::Frog,
            ActorKind::Barnacle => TileType::Barnacle,
        }
    }
}

// ── Items ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ItemKind {
    Chip,
    Key(KeyColour),
    Speed,
    Invincibility,
    ExtraLife,
    IncreaseTime,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Item {
    pub pos: Coord,
    pub kind: ItemKind,
}

impl Item {
    pub fn new(pos: Coord, kind: ItemKind) -> Self {
        Item { pos, kind }
    }

    pub fn from_char(c: char, pos: Coord) -> Option<Self> {
        let kind = match c {
            'c' => ItemKind::Chip,
            'r' | 'g' | 'y' | 'b' => ItemKind::Key(KeyColour::from_letter(c)?),
            ']' => ItemKind::Speed,
            'v' => ItemKind::Invincibility,
            'x' => ItemKind::ExtraLife,
            '+' => ItemKind::IncreaseTime,
            _ => return None,
        };
        Some(Item::new(pos, kind))
    }

    pub fn to_char(&self) -> char {
        match self.kind {
            ItemKind::Chip => 'c',
            ItemKind::Key(colour) => colour.letter(),
            ItemKind::Speed => ']',
            ItemKind::Invincibility => 'v',
            ItemKind::ExtraLife => 'x',
            ItemKind::IncreaseTime => '+',
        }
    }

    pub fn sprite(&self) -> &'static str {
        match self.kind {
            ItemKind::Chip => "chip",
            ItemKind::Key(KeyColour::Red) => "key-red",
            ItemKind::Key(KeyColour::Green) => "key-green",
            ItemKind::Key(KeyColour::Yellow) => "key-yellow",
            ItemKind::Key(KeyColour::Blue) => "key-blue",
            ItemKind::Speed => "speed",
            ItemKind::Invincibility => "invincibility",
            ItemKind::ExtraLife => "extra-life",
            ItemKind::IncreaseTime => "increase-time",
        }
    }
}

impl Tagged for Item {
    fn tile_type(&self) -> TileType {
        match self.kind {
            ItemKind::Chip => TileType::Chip,
            ItemKind::Key(_) => TileType::Key,
            ItemKind::Speed => TileType::Speed,
            ItemKind::Invincibility => TileType::Invincibility,
            ItemKind::ExtraLife => TileType::ExtraLife,
            ItemKind::IncreaseTime => TileType::IncreaseTime,
        }
    }
}

// ── Inventory ──

/// Slot letters in save/level order: chips, four key colours, extra lives.
pub const INVENTORY_SLOTS: [char; 6] = ['c', 'r', 'g', 'y', 'b', 'e'];

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Inventory {
    pub chips: u32,
    pub keys: [u32; 4],
    pub extra_lives: u32,
}

impl Inventory {
    pub fn keys(&self, colour: KeyColour) -> u32 {
        self.keys[colour as usize]
    }

    pub fn add_key(&mut self, colour: KeyColour) {
        self.keys[colour as usize] += 1;
    }

    /// Take one key of `colour`; false if none is held.
    pub fn use_key(&mut self, colour: KeyColour) -> bool {
        let slot = &mut self.keys[colour as usize];
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    /// Slot counts in `INVENTORY_SLOTS` order.
    pub fn to_slots(&self) -> [u32; 6] {
        [self.chips, self.keys[0], self.keys[1], self.keys[2], self.keys[3], self.extra_lives]
    }

    /// Restore from slot counts. Returns `None` unless exactly six slots
    /// are given.
    pub fn from_slots(slots: &[u32]) -> Option<Self> {
        let &[chips, r, g, y, b, extra_lives] = slots else {
            return None;
        };
        Some(Inventory { chips, keys: [r, g, y, b], extra_lives })
    }

    pub fn set_slot(&mut self, letter: char, count: u32) -> bool {
        match letter {
            'c' => self.chips = count,
            'e' => self.extra_lives = count,
            other => match KeyColour::from_letter(other) {
                Some(colour) => self.keys[colour as usize] = count,
                None => return false,
            },
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_chars_round_trip() {
        for c in "*#@%$^;".chars() {
            assert_eq!(ActorKind::from_char(c).unwrap().to_char(), c);
        }
        assert!(ActorKind::from_char('-').is_none());
    }

    #[test]
    fn item_chars_round_trip() {
        for c in "crgyb]vx+".chars() {
            assert_eq!(Item::from_char(c, Coord::new(0, 0)).unwrap().to_char(), c);
        }
    }

    #[test]
    fn walkable_sets_differ_per_kind() {
        let player = ActorKind::Player(PlayerState::default());
        assert!(player.walkable(TileType::Exit));
        assert!(!ActorKind::Block.walkable(TileType::Exit));
        assert!(ActorKind::Block.walkable(TileType::Water));
        assert!(!ActorKind::Frog.walkable(TileType::Water));
        assert!(!player.walkable(TileType::Wall));
    }

    #[test]
    fn keys_are_consumed_one_at_a_time() {
        let mut inv = Inventory::default();
        inv.add_key(KeyColour::Blue);
        assert!(inv.use_key(KeyColour::Blue));
        assert!(!inv.use_key(KeyColour::Blue));
        assert!(!inv.use_key(KeyColour::Red));
    }

    #[test]
    fn slot_restore_rejects_wrong_length() {
        assert!(Inventory::from_slots(&[1, 2, 3]).is_none());
        assert!(Inventory::from_slots(&[1, 0, 0, 0, 0, 0, 9]).is_none());
        let inv = Inventory::from_slots(&[5, 1, 0, 0, 2, 1]).unwrap();
        assert_eq!(inv.chips, 5);
        assert_eq!(inv.keys(KeyColour::Blue), 2);
        assert_eq!(inv.to_slots(), [5, 1, 0, 0, 2, 1]);
    }
}
