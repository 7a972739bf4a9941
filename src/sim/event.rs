/// Game events emitted by the simulation step.
/// The front end and any subscribers consume these; the core never
/// reads them back.

use crate::domain::coord::Coord;
use crate::domain::entity::ItemKind;
pub use crate::domain::rules::DeathCause;
use crate::domain::tile::KeyColour;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// Score is the time left on the clock.
    Won { remaining_secs: u32 },
    Lost(DeathCause),
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    ItemCollected { at: Coord, item: ItemKind },
    DoorOpened { at: Coord, colour: KeyColour },
    SocketOpened { at: Coord },
    BlockPushed { from: Coord, to: Coord },
    WaterFilled { at: Coord },
    DirtCleared { at: Coord },
    ButtonPressed { at: Coord },
    ButtonReleased { at: Coord },
    ActorTrapped { at: Coord },
    ActorFreed { at: Coord },
    BoatMoved { from: Coord, to: Coord },
    ActorKilled { at: Coord, cause: DeathCause },
    MinigameStarted { barnacle: Coord },
    MinigameWon { barnacle: Coord },
    MinigameAbandoned,
    ExtraLifeUsed { cause: DeathCause, remaining: u32 },
    LevelEnded(Outcome),
}
