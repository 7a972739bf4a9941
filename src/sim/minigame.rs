/// Barnacle minigame: escape by clicking exactly N times before the
/// deadline.
///
/// Clicks are queued by the command surface and folded in during the input
/// phase of the next tick, so the minigame never races the simulation.
/// Elapsed time comes from one of two clocks, picked by
/// `BarnacleConfig::pause_suspends_deadline`:
///   - simulated: tick_rate_ms per tick, frozen while paused
///   - wall clock: real time since start, keeps running while paused

use std::time::Instant;

use crate::config::BarnacleConfig;
use crate::domain::coord::Coord;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MinigameStatus {
    Pending,
    Won,
    Lost,
}

#[derive(Clone, Debug)]
pub struct Minigame {
    /// Barnacle that started the game; removed on a win.
    pub barnacle: Coord,
    clicks: u32,
    simulated_ms: u64,
    started: Instant,
}

impl Minigame {
    pub fn start(barnacle: Coord, now: Instant) -> Self {
        Minigame { barnacle, clicks: 0, simulated_ms: 0, started: now }
    }

    pub fn click(&mut self, count: u32) {
        self.clicks += count;
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    /// Credit one tick of simulated time.
    pub fn advance(&mut self, ms: u64) {
        self.simulated_ms += ms;
    }

    pub fn elapsed_ms(&self, cfg: &BarnacleConfig, now: Instant) -> u64 {
        if cfg.pause_suspends_deadline {
            self.simulated_ms
        } else {
            now.saturating_duration_since(self.started).as_millis() as u64
        }
    }

    pub fn time_left_ms(&self, cfg: &BarnacleConfig, now: Instant) -> u64 {
        cfg.deadline_ms.saturating_sub(self.elapsed_ms(cfg, now))
    }

    /// Deadline first, then over-clicking, then the exact count.
    pub fn resolve(&self, cfg: &BarnacleConfig, now: Instant) -> MinigameStatus {
        if self.elapsed_ms(cfg, now) > cfg.deadline_ms {
            MinigameStatus::Lost
        } else if self.clicks > cfg.clicks_required {
            MinigameStatus::Lost
        } else if self.clicks == cfg.clicks_required {
            MinigameStatus::Won
        } else {
            MinigameStatus::Pending
        }
    }
}
