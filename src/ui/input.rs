/// Keyboard tracker: which keys are held, which were just pressed.
///
/// Held keys drive continuous movement; fresh presses drive taps and
/// one-shot commands (pause, save, minigame clicks).
///
/// Terminals that report key releases (keyboard enhancement) release keys
/// explicitly. Everywhere else a key counts as released once no
/// Press/Repeat event has arrived for `HOLD_TIMEOUT`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Slightly longer than a typical key-repeat interval.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub struct KeyTracker {
    last_active: HashMap<KeyCode, Instant>,
    /// Keys that went from released to held during the last drain.
    fresh: Vec<KeyCode>,
    /// Raw events from the last drain, for modifier checks.
    raw: Vec<KeyEvent>,
    pub honor_release: bool,
}

impl KeyTracker {
    pub fn new() -> Self {
        KeyTracker {
            last_active: HashMap::with_capacity(16),
            fresh: Vec::with_capacity(8),
            raw: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Read every pending terminal event without blocking.
    pub fn drain_events(&mut self) {
        self.fresh.clear();
        self.raw.clear();
        while event::poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.apply(key, Instant::now());
            }
        }
        self.expire(Instant::now());
    }

    fn apply(&mut self, key: KeyEvent, now: Instant) {
        self.raw.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {}
            _ => {
                if !self.is_held_at(key.code, now) {
                    self.fresh.push(key.code);
                }
                self.last_active.insert(key.code, now);
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        self.last_active
            .retain(|_, t| now.saturating_duration_since(*t) < HOLD_TIMEOUT);
    }

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active
            .get(&code)
            .is_some_and(|t| now.saturating_duration_since(*t) < HOLD_TIMEOUT)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        let now = Instant::now();
        codes.iter().any(|c| self.is_held_at(*c, now))
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.fresh.contains(c))
    }

    /// Number of fresh presses of any of `codes` (repeats included) in the
    /// last drain. Each one is a minigame click.
    pub fn press_count(&self, codes: &[KeyCode]) -> usize {
        self.raw
            .iter()
            .filter(|k| k.kind != KeyEventKind::Release && codes.contains(&k.code))
            .count()
    }

    pub fn ctrl_pressed(&self, c: char) -> bool {
        self.raw.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && k.code == KeyCode::Char(c)
                && k.kind != KeyEventKind::Release
        })
    }
}
