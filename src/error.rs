//! Error types for level loading and the session command surface.
//!
//! In-game deaths are not errors; they are `Outcome`s. These types cover
//! malformed input and callers using the API out of order.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::coord::Coord;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level file not found: {path}")]
    NotFound { path: PathBuf },
    #[error("failed to read level file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("level format was incorrect at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("level file ended early at line {line}")]
    UnexpectedEof { line: usize },
    #[error("inventory expects 6 slots, got {found}")]
    InventoryMismatch { found: usize },
}

impl LevelError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        LevelError::Parse { line, message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no level has been loaded")]
    NotLoaded,
    #[error("the scheduler is already running")]
    AlreadyRunning,
    #[error("the scheduler is not running")]
    NotRunning,
    #[error("level timing was never started")]
    LevelNotStarted,
    #[error("level timing is already running")]
    LevelAlreadyStarted,
    #[error("button at {at} was left without being pressed")]
    ButtonNotPressed { at: Coord },
    #[error("no further level in the index")]
    NoNextLevel,
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error("failed to write save file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;
