/// Fixed-interval tick scheduler.
///
/// Single-threaded: the game loop asks `due_ticks(now)` how many ticks to
/// run and calls the step function that many times. The scheduler itself
/// never touches the world.
///
/// ```text
///            start            pause
///  Stopped ────────▶ Running ───────▶ Paused
///     ▲                 │  ◀───────     │
///     └──── stop ───────┴── unpause     │
///     └──────────────── stop ───────────┘
/// ```
///
/// Level timing (`start_level` / `end_level`) is tracked separately so the
/// time-to-complete of a level can be reported.

use std::time::{Duration, Instant};

use crate::error::{SessionError, SessionResult};

/// Upper bound on catch-up ticks after a stall (window drag, suspend).
const MAX_CATCH_UP: u32 = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

#[derive(Clone, Debug)]
pub struct Scheduler {
    state: RunState,
    tick_rate: Duration,
    last_fire: Option<Instant>,
    current_tick: u64,
    level_start: Option<u64>,
    level_end: Option<u64>,
}

impl Scheduler {
    pub fn new(tick_rate_ms: u64) -> Self {
        Scheduler {
            state: RunState::Stopped,
            tick_rate: Duration::from_millis(tick_rate_ms.max(1)),
            last_fire: None,
            current_tick: 0,
            level_start: None,
            level_end: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    pub fn tick_rate(&self) -> Duration {
        self.tick_rate
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn start(&mut self, now: Instant) -> SessionResult<()> {
        if self.state != RunState::Stopped {
            return Err(SessionError::AlreadyRunning);
        }
        self.state = RunState::Running;
        self.last_fire = Some(now);
        Ok(())
    }

    pub fn stop(&mut self) -> SessionResult<()> {
        if self.state == RunState::Stopped {
            return Err(SessionError::NotRunning);
        }
        self.state = RunState::Stopped;
        self.last_fire = None;
        Ok(())
    }

    pub fn pause(&mut self) -> SessionResult<()> {
        match self.state {
            RunState::Running => {
                self.state = RunState::Paused;
                Ok(())
            }
            RunState::Paused => Ok(()),
            RunState::Stopped => Err(SessionError::NotRunning),
        }
    }

    pub fn unpause(&mut self) -> SessionResult<()> {
        match self.state {
            RunState::Paused => {
                self.state = RunState::Running;
                Ok(())
            }
            RunState::Running => Ok(()),
            RunState::Stopped => Err(SessionError::NotRunning),
        }
    }

    /// Ticks that have come due since the last call. Paused schedulers
    /// still fire; the step treats those ticks as no-ops.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        let Some(last) = self.last_fire else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(last);
        let due = (elapsed.as_millis() / self.tick_rate.as_millis().max(1)) as u32;
        if due == 0 {
            return 0;
        }
        if due > MAX_CATCH_UP {
            self.last_fire = Some(now);
            return MAX_CATCH_UP;
        }
        self.last_fire = Some(last + self.tick_rate * due);
        due
    }

    /// Count a fired tick.
    pub fn advance(&mut self) -> u64 {
        self.current_tick += 1;
        self.current_tick
    }

    // ── Level timing ──

    pub fn start_level(&mut self) -> SessionResult<()> {
        if self.level_start.is_some() && self.level_end.is_none() {
            return Err(SessionError::LevelAlreadyStarted);
        }
        self.level_start = Some(self.current_tick);
        self.level_end = None;
        Ok(())
    }

    pub fn end_level(&mut self) -> SessionResult<()> {
        match (self.level_start, self.level_end) {
            (Some(_), None) => {
                self.level_end = Some(self.current_tick);
                Ok(())
            }
            _ => Err(SessionError::LevelNotStarted),
        }
    }

    pub fn level_timing(&self) -> bool {
        self.level_start.is_some() && self.level_end.is_none()
    }

    /// Ticks between `start_level` and `end_level` of the last finished level.
    pub fn time_to_complete(&self) -> Option<u64> {
        Some(self.level_end? - self.level_start?)
    }

    /// Forget level timing (new level loaded).
    pub fn reset_level(&mut self) {
        self.level_start = None;
        self.level_end = None;
    }
}
