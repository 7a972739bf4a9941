/// Terrain tiles and the per-tile state machines.
///
/// The tile layer holds one `Tile` per coordinate. Plain terrain carries no
/// state; the "action" tiles (Button, Trap, Ice, BoatPath, Water, Dirt, Exit)
/// react to actors entering, leaving, or to each scheduler tick. The hooks
/// themselves live in `sim::tiles`, because they reach across layers;
/// this module owns only the state each tile keeps and the pure rules that
/// read it.

use super::coord::{Coord, Direction};
use super::entity::{ActorId, Inventory};

/// Closed tag set shared by tiles, actors and items.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TileType {
    Path,
    Dirt,
    Wall,
    Exit,
    Button,
    Trap,
    Water,
    ChipSocket,
    LockedDoor,
    Ice,
    Key,
    Chip,
    Player,
    Block,
    PinkBall,
    Bug,
    Frog,
    Barnacle,
    BoatPath,
    Speed,
    Invincibility,
    ExtraLife,
    IncreaseTime,
}

/// Anything stored in a layer can report its tag.
pub trait Tagged {
    fn tile_type(&self) -> TileType;
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum KeyColour {
    Red,
    Green,
    Yellow,
    Blue,
}

impl KeyColour {
    pub const ALL: [KeyColour; 4] =
        [KeyColour::Red, KeyColour::Green, KeyColour::Yellow, KeyColour::Blue];

    /// Lower-case letter used for keys, inventory slots and, upper-cased,
    /// for doors.
    pub fn letter(self) -> char {
        match self {
            KeyColour::Red => 'r',
            KeyColour::Green => 'g',
            KeyColour::Yellow => 'y',
            KeyColour::Blue => 'b',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'r' => Some(KeyColour::Red),
            'g' => Some(KeyColour::Green),
            'y' => Some(KeyColour::Yellow),
            'b' => Some(KeyColour::Blue),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyColour::Red => "red",
            KeyColour::Green => "green",
            KeyColour::Yellow => "yellow",
            KeyColour::Blue => "blue",
        }
    }
}

// ── Ice ──

/// Shape of an ice tile. Corner tiles have two "wall" sides named by the
/// corner they sit in: a TopLeft corner is walled on its north and west.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IceCorner {
    Normal,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl IceCorner {
    /// Direction a rider travelling `dir` leaves this tile in.
    ///
    /// ```text
    ///  TopLeft     W→S  N→E        TopRight    E→S  N→W
    ///  BottomLeft  W→N  S→E        BottomRight E→N  S→W
    /// ```
    pub fn redirect(self, dir: Direction) -> Direction {
        use Direction::*;
        match (self, dir) {
            (IceCorner::TopLeft, West) => South,
            (IceCorner::TopLeft, North) => East,
            (IceCorner::TopRight, East) => South,
            (IceCorner::TopRight, North) => West,
            (IceCorner::BottomLeft, West) => North,
            (IceCorner::BottomLeft, South) => East,
            (IceCorner::BottomRight, East) => North,
            (IceCorner::BottomRight, South) => West,
            (_, d) => d,
        }
    }

    /// Can an actor travelling `dir` slide onto this tile?
    /// Entering travelling East means arriving through the west side.
    pub fn admits(self, dir: Direction) -> bool {
        use Direction::*;
        !matches!(
            (self, dir),
            (IceCorner::TopLeft, East | South)
                | (IceCorner::TopRight, West | South)
                | (IceCorner::BottomLeft, East | North)
                | (IceCorner::BottomRight, West | North)
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IceState {
    pub corner: IceCorner,
    pub rider: Option<ActorId>,
    pub entry_tick: u64,
    /// Ticks seen by this tile since load.
    pub ticks: u64,
}

impl IceState {
    pub fn new(corner: IceCorner) -> Self {
        IceState { corner, rider: None, entry_tick: 0, ticks: 0 }
    }
}

// ── BoatPath ──

#[derive(Clone, Debug, PartialEq)]
pub struct BoatState {
    pub push: Direction,
    pub boat: bool,
    /// Travelling against `push` on a non-cyclic chain.
    pub reversing: bool,
    pub rider: Option<ActorId>,
    pub ticks_since_move: u32,
    /// World tick on which the boat arrived; it rests for that tick.
    pub arrived_tick: u64,
}

impl BoatState {
    pub fn new(push: Direction) -> Self {
        BoatState {
            push,
            boat: false,
            reversing: false,
            rider: None,
            ticks_since_move: 0,
            arrived_tick: 0,
        }
    }

    pub fn travel(&self) -> Direction {
        if self.reversing { self.push.flip() } else { self.push }
    }

    /// Receive a boat (and whatever rides it) from a neighbour.
    pub fn move_boat_to(&mut self, reversing: bool, tick: u64) {
        self.boat = true;
        self.reversing = reversing;
        self.ticks_since_move = 0;
        self.arrived_tick = tick;
    }

    /// Hand the boat on; returns the rider that has to follow it.
    pub fn move_boat_away(&mut self) -> Option<ActorId> {
        self.boat = false;
        self.reversing = false;
        self.ticks_since_move = 0;
        self.rider.take()
    }
}

// ── Button / Trap ──

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ButtonState {
    pub links: Vec<Coord>,
    pub pressed: bool,
}

/// A trap is armed ("set") while no linked button is held down.
/// `presses` counts the buttons currently holding it open.
#[derive(Clone, Debug, PartialEq)]
pub struct TrapState {
    pub set: bool,
    pub presses: u32,
    pub occupant: Option<ActorId>,
}

impl Default for TrapState {
    fn default() -> Self {
        TrapState { set: true, presses: 0, occupant: None }
    }
}

impl TrapState {
    /// Hold the trap open. Returns the actor to free, if any, the first time
    /// the trap opens.
    pub fn disable(&mut self) -> Option<ActorId> {
        self.presses += 1;
        if self.set {
            self.set = false;
            return self.occupant.take();
        }
        None
    }

    /// Release one hold; re-arms once nothing holds it open.
    pub fn enable(&mut self) {
        self.presses = self.presses.saturating_sub(1);
        if self.presses == 0 {
            self.set = true;
        }
    }

    /// Catch an actor if armed. Returns whether it was caught.
    pub fn catch(&mut self, actor: ActorId) -> bool {
        if self.set {
            self.occupant = Some(actor);
        }
        self.set
    }
}

// ── Tile ──

#[derive(Clone, Debug, PartialEq)]
pub enum TileKind {
    Path,
    Dirt,
    Wall,
    Exit,
    Water,
    Button(ButtonState),
    Trap(TrapState),
    ChipSocket { required: i32 },
    LockedDoor(KeyColour),
    Ice(IceState),
    BoatPath(BoatState),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub pos: Coord,
    pub kind: TileKind,
}

impl Tile {
    pub fn new(pos: Coord, kind: TileKind) -> Self {
        Tile { pos, kind }
    }

    /// Build a tile from its level-grid character.
    pub fn from_char(c: char, pos: Coord) -> Option<Self> {
        let kind = match c {
            'P' => TileKind::Path,
            'D' => TileKind::Dirt,
            'W' => TileKind::Wall,
            'E' => TileKind::Exit,
            'C' => TileKind::Button(ButtonState::default()),
            'T' => TileKind::Trap(TrapState::default()),
            'O' => TileKind::Water,
            'S' => TileKind::ChipSocket { required: 0 },
            'R' | 'G' | 'Y' | 'B' => TileKind::LockedDoor(KeyColour::from_letter(c)?),
            'I' => TileKind::Ice(IceState::new(IceCorner::Normal)),
            'U' => TileKind::Ice(IceState::new(IceCorner::TopLeft)),
            'J' => TileKind::Ice(IceState::new(IceCorner::TopRight)),
            'K' => TileKind::Ice(IceState::new(IceCorner::BottomLeft)),
            'L' => TileKind::Ice(IceState::new(IceCorner::BottomRight)),
            'A' => TileKind::BoatPath(BoatState::new(Direction::North)),
            'F' => TileKind::BoatPath(BoatState::new(Direction::East)),
            'H' => TileKind::BoatPath(BoatState::new(Direction::South)),
            'M' => TileKind::BoatPath(BoatState::new(Direction::West)),
            _ => return None,
        };
        Some(Tile::new(pos, kind))
    }

    /// Level-grid character for this tile; inverse of `from_char`.
    pub fn to_char(&self) -> char {
        match &self.kind {
            TileKind::Path => 'P',
            TileKind::Dirt => 'D',
            TileKind::Wall => 'W',
            TileKind::Exit => 'E',
            TileKind::Water => 'O',
            TileKind::Button(_) => 'C',
            TileKind::Trap(_) => 'T',
            TileKind::ChipSocket { .. } => 'S',
            TileKind::LockedDoor(colour) => colour.letter().to_ascii_uppercase(),
            TileKind::Ice(ice) => match ice.corner {
                IceCorner::Normal => 'I',
                IceCorner::TopLeft => 'U',
                IceCorner::TopRight => 'J',
                IceCorner::BottomLeft => 'K',
                IceCorner::BottomRight => 'L',
            },
            TileKind::BoatPath(boat) => match boat.push {
                Direction::North => 'A',
                Direction::East => 'F',
                Direction::South => 'H',
                Direction::West => 'M',
            },
        }
    }

    /// Subtract `n` chips from a socket's requirement. The socket turns into
    /// Path once nothing remains; returns whether it opened.
    pub fn deduct_chips(&mut self, n: u32) -> bool {
        let TileKind::ChipSocket { required } = &mut self.kind else {
            return false;
        };
        *required -= n as i32;
        if *required <= 0 {
            self.kind = TileKind::Path;
            return true;
        }
        false
    }

    /// Open a locked door with a key of its colour, taking the key.
    pub fn test_lock(&mut self, inventory: &mut Inventory) -> bool {
        let TileKind::LockedDoor(colour) = self.kind else {
            return false;
        };
        if !inventory.use_key(colour) {
            return false;
        }
        self.kind = TileKind::Path;
        true
    }

    /// Opaque sprite key. Front ends map it to whatever they draw.
    pub fn sprite(&self) -> &'static str {
        match &self.kind {
            TileKind::Path => "path",
            TileKind::Dirt => "dirt",
            TileKind::Wall => "wall",
            TileKind::Exit => "exit",
            TileKind::Water => "water",
            TileKind::Button(b) if b.pressed => "button-down",
            TileKind::Button(_) => "button",
            TileKind::Trap(t) if t.set => "trap",
            TileKind::Trap(_) => "trap-open",
            TileKind::ChipSocket { .. } => "chip-socket",
            TileKind::LockedDoor(KeyColour::Red) => "door-red",
            TileKind::LockedDoor(KeyColour::Green) => "door-green",
            TileKind::LockedDoor(KeyColour::Yellow) => "door-yellow",
            TileKind::LockedDoor(KeyColour::Blue) => "door-blue",
            TileKind::Ice(ice) => match ice.corner {
                IceCorner::Normal => "ice",
                IceCorner::TopLeft => "ice-tl",
                IceCorner::TopRight => "ice-tr",
                IceCorner::BottomLeft => "ice-bl",
                IceCorner::BottomRight => "ice-br",
            },
            TileKind::BoatPath(b) if b.boat => "boat",
            TileKind::BoatPath(_) => "boat-path",
        }
    }
}

impl Tagged for Tile {
    fn tile_type(&self) -> TileType {
        match self.kind {
            TileKind::Path => TileType::Path,
            TileKind::Dirt => TileType::Dirt,
            TileKind::Wall => TileType::Wall,
            TileKind::Exit => TileType::Exit,
            TileKind::Water => TileType::Water,
            TileKind::Button(_) => TileType::Button,
            TileKind::Trap(_) => TileType::Trap,
            TileKind::ChipSocket { .. } => TileType::ChipSocket,
            TileKind::LockedDoor(_) => TileType::LockedDoor,
            TileKind::Ice(_) => TileType::Ice,
            TileKind::BoatPath(_) => TileType::BoatPath,
        }
    }
}
