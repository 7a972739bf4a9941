/// Session: the command surface a front end drives.
///
/// Owns the config, the scheduler, the loaded level and its live `World`,
/// plus the input queue. Every call that changes the world goes through
/// here; the front end only reads state back through the query methods or
/// a `subscribe` channel.
///
/// After each tick the arbiter looks at the world's outcome:
///   - a death with an extra life left restarts the level in place
///   - anything else ends level timing, stops the scheduler and is
///     broadcast as `LevelEnded`

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::config::GameConfig;
use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::{Actor, Inventory, Item};
use crate::domain::rules::DeathCause;
use crate::domain::tile::Tile;
use crate::error::{LevelError, SessionError, SessionResult};
use crate::sim::event::{GameEvent, Outcome};
use crate::sim::level::{self, IndexEntry, LevelData};
use crate::sim::save::{self, SaveMeta};
use crate::sim::scheduler::{RunState, Scheduler};
use crate::sim::step::{self, TickInput};
use crate::sim::world::World;

struct LoadedLevel {
    data: LevelData,
    name: String,
    ordinal: Option<u32>,
    is_last: bool,
}

pub struct Session {
    config: GameConfig,
    scheduler: Scheduler,
    level: Option<LoadedLevel>,
    world: Option<World>,
    /// Directions currently held, most recent last.
    held: Vec<Direction>,
    /// Single taps, one consumed per tick.
    taps: VecDeque<Direction>,
    clicks: u32,
    subscribers: Vec<Sender<GameEvent>>,
    index: Vec<IndexEntry>,
    outcome: Option<Outcome>,
}

impl Session {
    pub fn new(config: GameConfig) -> Self {
        let index = level::load_index(&config.levels_dir);
        Self::with_index(config, index)
    }

    pub fn with_index(config: GameConfig, index: Vec<IndexEntry>) -> Self {
        let scheduler = Scheduler::new(config.timing.tick_rate_ms);
        Session {
            config,
            scheduler,
            level: None,
            world: None,
            held: Vec::new(),
            taps: VecDeque::new(),
            clicks: 0,
            subscribers: Vec::new(),
            index,
            outcome: None,
        }
    }

    // ── Loading ──

    /// Load a level file. `ordinal`/`is_last` override the file's own
    /// flags line when given.
    pub fn load(&mut self, path: &Path, ordinal: Option<u32>, is_last: bool) -> SessionResult<()> {
        let mut data = level::load_from_path(path)?;
        if ordinal.is_some() {
            data.ordinal = ordinal;
            data.is_last = is_last;
        }
        let name = path
            .file_stem()
            .map_or_else(|| "level".to_string(), |s| s.to_string_lossy().into_owned());
        self.install(data, name)
    }

    pub fn load_text(&mut self, text: &str, name: &str) -> SessionResult<()> {
        let data = level::parse(text)?;
        self.install(data, name.to_string())
    }

    pub fn load_entry(&mut self, entry: &IndexEntry) -> SessionResult<()> {
        let mut data = entry.read()?;
        data.ordinal = Some(entry.ordinal);
        data.is_last = entry.is_last;
        self.install(data, entry.name.clone())
    }

    /// Load the index entry after the current level (the first one if
    /// nothing is loaded).
    pub fn load_next(&mut self) -> SessionResult<()> {
        let next = match &self.level {
            None => self.index.first(),
            Some(level) if level.is_last => None,
            Some(level) => {
                let want = level.ordinal.map_or(1, |n| n + 1);
                self.index.iter().find(|e| e.ordinal == want)
            }
        };
        let entry = next.cloned().ok_or(SessionError::NoNextLevel)?;
        self.load_entry(&entry)
    }

    fn install(&mut self, data: LevelData, name: String) -> SessionResult<()> {
        let world = data.build(&self.config.rules, self.config.timing.tick_rate_ms)?;
        if self.scheduler.state() != RunState::Stopped {
            self.scheduler.stop()?;
        }
        self.scheduler.reset_level();
        log::info!(
            "loaded level {name:?} ({}x{}, {}s, ordinal {:?})",
            data.width,
            data.height,
            data.duration,
            data.ordinal
        );
        self.level = Some(LoadedLevel { ordinal: data.ordinal, is_last: data.is_last, data, name });
        self.world = Some(world);
        self.outcome = None;
        self.clear_input();
        Ok(())
    }

    // ── Run control ──

    pub fn start(&mut self, now: Instant) -> SessionResult<()> {
        if self.world.is_none() {
            return Err(SessionError::NotLoaded);
        }
        self.scheduler.start(now)?;
        if !self.scheduler.level_timing() {
            self.scheduler.start_level()?;
        }
        Ok(())
    }

    pub fn pause(&mut self) -> SessionResult<()> {
        self.scheduler.pause()
    }

    pub fn unpause(&mut self) -> SessionResult<()> {
        self.scheduler.unpause()
    }

    /// Stop the scheduler. A running minigame is abandoned and the player
    /// released.
    pub fn stop(&mut self) -> SessionResult<()> {
        self.scheduler.stop()?;
        let Some(world) = self.world.as_mut() else {
            return Ok(());
        };
        if world.minigame.take().is_some() {
            if let Some(player) = world.player_mut() {
                player.trapped = false;
            }
            let events = vec![GameEvent::MinigameAbandoned];
            self.broadcast(&events);
        }
        Ok(())
    }

    /// Rebuild the level from its loaded data. With `used_extra_life` the
    /// current extra-life count carries over and, if configured, so does
    /// the level clock; otherwise everything starts fresh.
    pub fn restart(&mut self, used_extra_life: bool) -> SessionResult<()> {
        let level = self.level.as_ref().ok_or(SessionError::NotLoaded)?;
        let mut world = level.data.build(&self.config.rules, self.config.timing.tick_rate_ms)?;
        if used_extra_life {
            if let Some(old) = &self.world {
                world.inventory.extra_lives = old.inventory.extra_lives;
                if self.config.rules.extra_life_keeps_clock {
                    world.clock = old.clock.clone();
                }
            }
        } else {
            self.scheduler.reset_level();
            if self.scheduler.state() != RunState::Stopped {
                self.scheduler.start_level()?;
            }
        }
        log::info!("restarted {:?} (extra life: {used_extra_life})", level.name);
        self.world = Some(world);
        self.outcome = None;
        self.clear_input();
        Ok(())
    }

    // ── Input ──

    pub fn press(&mut self, dir: Direction) {
        self.held.retain(|d| *d != dir);
        self.held.push(dir);
    }

    pub fn release(&mut self, dir: Direction) {
        self.held.retain(|d| *d != dir);
    }

    pub fn direction_input(&mut self, dir: Direction) {
        self.taps.push_back(dir);
    }

    pub fn minigame_click(&mut self) {
        self.clicks += 1;
    }

    fn clear_input(&mut self) {
        self.held.clear();
        self.taps.clear();
        self.clicks = 0;
    }

    // ── Ticking ──

    /// Run one tick now. Paused sessions only check a wall-clock minigame
    /// deadline.
    pub fn tick(&mut self, now: Instant) -> SessionResult<Vec<GameEvent>> {
        let world = self.world.as_mut().ok_or(SessionError::NotLoaded)?;
        let events = match self.scheduler.state() {
            RunState::Stopped => return Err(SessionError::NotRunning),
            RunState::Paused => step::paused_step(world, &self.config.barnacle, now),
            RunState::Running => {
                self.scheduler.advance();
                let input = TickInput {
                    direction: self.taps.pop_front().or_else(|| self.held.last().copied()),
                    clicks: std::mem::take(&mut self.clicks),
                };
                step::step(world, input, &self.config.barnacle, now)?
            }
        };
        for event in &events {
            log::debug!("{event:?}");
        }
        let events = self.arbitrate(events)?;
        self.broadcast(&events);
        Ok(events)
    }

    /// Run however many ticks the scheduler says are due.
    pub fn run_due(&mut self, now: Instant) -> SessionResult<Vec<GameEvent>> {
        let mut events = Vec::new();
        for _ in 0..self.scheduler.due_ticks(now) {
            if self.scheduler.state() == RunState::Stopped {
                break;
            }
            events.extend(self.tick(now)?);
        }
        Ok(events)
    }

    fn arbitrate(&mut self, mut events: Vec<GameEvent>) -> SessionResult<Vec<GameEvent>> {
        let Some(world) = self.world.as_mut() else {
            return Ok(events);
        };
        let Some(outcome) = world.outcome else {
            return Ok(events);
        };

        if let Outcome::Lost(cause) = outcome {
            if cause != DeathCause::ExtraLifeConsumed && world.inventory.extra_lives > 0 {
                world.inventory.extra_lives -= 1;
                let remaining = world.inventory.extra_lives;
                self.restart(true)?;
                log::info!("{}; {remaining} extra lives left", cause.describe());
                events.push(GameEvent::ExtraLifeUsed { cause, remaining });
                return Ok(events);
            }
        }

        if self.scheduler.level_timing() {
            self.scheduler.end_level()?;
        }
        if self.scheduler.state() != RunState::Stopped {
            self.scheduler.stop()?;
        }
        match outcome {
            Outcome::Won { remaining_secs } => log::info!("level won with {remaining_secs}s left"),
            Outcome::Lost(cause) => log::info!("level lost: {}", cause.describe()),
        }
        self.outcome = Some(outcome);
        events.push(GameEvent::LevelEnded(outcome));
        Ok(events)
    }

    // ── Events ──

    pub fn subscribe(&mut self) -> Receiver<GameEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every subscriber, dropping the ones whose receiver is gone.
    fn broadcast(&mut self, events: &[GameEvent]) {
        if events.is_empty() {
            return;
        }
        self.subscribers
            .retain(|tx| events.iter().all(|e| tx.send(e.clone()).is_ok()));
    }

    // ── Queries ──

    pub fn world(&self) -> SessionResult<&World> {
        self.world.as_ref().ok_or(SessionError::NotLoaded)
    }

    pub fn tile_at(&self, at: Coord) -> SessionResult<Option<&Tile>> {
        Ok(self.world()?.tiles.get(at))
    }

    pub fn actor_at(&self, at: Coord) -> SessionResult<Option<&Actor>> {
        Ok(self.world()?.actors.get(at))
    }

    pub fn item_at(&self, at: Coord) -> SessionResult<Option<&Item>> {
        Ok(self.world()?.items.get(at))
    }

    pub fn remaining_time(&self) -> SessionResult<u32> {
        Ok(self.world()?.clock.remaining_secs())
    }

    pub fn inventory(&self) -> SessionResult<Inventory> {
        Ok(self.world()?.inventory)
    }

    /// Replace the inventory from its six slot counts (c r g y b e).
    pub fn restore_inventory(&mut self, slots: &[u32]) -> SessionResult<()> {
        let inventory = Inventory::from_slots(slots)
            .ok_or(LevelError::InventoryMismatch { found: slots.len() })?;
        let world = self.world.as_mut().ok_or(SessionError::NotLoaded)?;
        world.inventory = inventory;
        Ok(())
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn run_state(&self) -> RunState {
        self.scheduler.state()
    }

    /// Ticks the last finished level took.
    pub fn time_to_complete(&self) -> Option<u64> {
        self.scheduler.time_to_complete()
    }

    pub fn minigame_time_left(&self, now: Instant) -> Option<u64> {
        let game = self.world.as_ref()?.minigame.as_ref()?;
        Some(game.time_left_ms(&self.config.barnacle, now))
    }

    pub fn level_name(&self) -> Option<&str> {
        self.level.as_ref().map(|l| l.name.as_str())
    }

    pub fn level_ordinal(&self) -> Option<u32> {
        self.level.as_ref()?.ordinal
    }

    pub fn fov(&self) -> Option<f64> {
        self.level.as_ref().map(|l| l.data.fov)
    }

    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // ── Saving ──

    pub fn save_text(&self) -> SessionResult<String> {
        let level = self.level.as_ref().ok_or(SessionError::NotLoaded)?;
        let meta = SaveMeta { fov: level.data.fov, ordinal: level.ordinal, is_last: level.is_last };
        Ok(save::save_text(self.world()?, meta))
    }

    pub fn save_to(&self, path: &Path) -> SessionResult<()> {
        save::write_save(path, &self.save_text()?)
    }

    /// Save under the configured save directory; returns the file written.
    pub fn save(&self) -> SessionResult<PathBuf> {
        let name = self.level_name().ok_or(SessionError::NotLoaded)?;
        let path = save::save_path(&self.config.resolved_save_dir(), name);
        self.save_to(&path)?;
        Ok(path)
    }
}
