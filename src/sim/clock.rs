/// Level countdown measured in scheduler ticks.
///
/// Remaining seconds are derived, never stored:
/// `max(0, total − elapsed_ticks · tick_ms / 1000)`.

#[derive(Clone, Debug, PartialEq)]
pub struct LevelClock {
    total_secs: u32,
    elapsed_ticks: u64,
    tick_rate_ms: u64,
}

impl LevelClock {
    pub fn new(total_secs: u32, tick_rate_ms: u64) -> Self {
        LevelClock { total_secs, elapsed_ticks: 0, tick_rate_ms: tick_rate_ms.max(1) }
    }

    pub fn remaining_secs(&self) -> u32 {
        let spent = self.elapsed_ticks * self.tick_rate_ms / 1000;
        u64::from(self.total_secs).saturating_sub(spent) as u32
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_secs() == 0
    }

    /// Advance one tick. Returns true on the tick the clock runs out.
    pub fn tick(&mut self) -> bool {
        if self.is_expired() {
            return false;
        }
        self.elapsed_ticks += 1;
        self.is_expired()
    }

    pub fn add_seconds(&mut self, secs: u32) {
        self.total_secs = self.total_secs.saturating_add(secs);
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn tick_rate_ms(&self) -> u64 {
        self.tick_rate_ms
    }
}
