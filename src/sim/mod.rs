pub mod clock;
pub mod event;
pub mod level;
pub mod minigame;
pub mod movement;
pub mod save;
pub mod scheduler;
pub mod session;
pub mod step;
pub mod tiles;
pub mod world;

#[cfg(test)]
pub(crate) mod testkit;
