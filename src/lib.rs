//! Chipmaze: a tile-grid puzzle simulation.
//!
//! `domain` holds the pure rules (tiles, actors, the move resolver, monster
//! AI), `sim` the mutable world, the step function and the `Session`
//! command surface, `ui` the terminal front end used by the binary.

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;
pub mod ui;
