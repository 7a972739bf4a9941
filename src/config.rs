/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub rules: RulesConfig,
    pub barnacle: BarnacleConfig,
    pub levels_dir: PathBuf,
    pub save_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
}

/// Move intervals are in ticks of the mover's own counter.
#[derive(Clone, Debug, PartialEq)]
pub struct RulesConfig {
    pub player_move_interval: u64,
    pub speed_move_interval: u64,
    pub bug_move_interval: u64,
    pub pink_ball_move_interval: u64,
    pub frog_move_interval: u64,
    pub ice_slide_interval: u64,
    pub boat_move_interval: u32,
    pub speed_ticks: u32,
    pub invincibility_ticks: u32,
    pub bonus_seconds: u32,
    pub frog_seed: u64,
    pub extra_life_keeps_clock: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BarnacleConfig {
    pub clicks_required: u32,
    pub deadline_ms: u64,
    /// true: deadline counts simulated tick time and freezes while paused.
    /// false: deadline counts wall-clock time and keeps running.
    pub pause_suspends_deadline: bool,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    barnacle: TomlBarnacle,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_player_move")]
    player_move_interval: u64,
    #[serde(default = "default_speed_move")]
    speed_move_interval: u64,
    #[serde(default = "default_bug_move")]
    bug_move_interval: u64,
    #[serde(default = "default_pink_ball_move")]
    pink_ball_move_interval: u64,
    #[serde(default = "default_frog_move")]
    frog_move_interval: u64,
    #[serde(default = "default_ice_slide")]
    ice_slide_interval: u64,
    #[serde(default = "default_boat_move")]
    boat_move_interval: u32,
    #[serde(default = "default_speed_ticks")]
    speed_ticks: u32,
    #[serde(default = "default_invincibility_ticks")]
    invincibility_ticks: u32,
    #[serde(default = "default_bonus_seconds")]
    bonus_seconds: u32,
    #[serde(default = "default_frog_seed")]
    frog_seed: u64,
    #[serde(default = "default_true")]
    extra_life_keeps_clock: bool,
}

#[derive(Deserialize, Debug)]
struct TomlBarnacle {
    #[serde(default = "default_clicks")]
    clicks_required: u32,
    #[serde(default = "default_deadline")]
    deadline_ms: u64,
    #[serde(default = "default_true")]
    pause_suspends_deadline: bool,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    save_dir: Option<String>,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 50 }
fn default_player_move() -> u64 { 4 }
fn default_speed_move() -> u64 { 2 }
fn default_bug_move() -> u64 { 8 }
fn default_pink_ball_move() -> u64 { 3 }
fn default_frog_move() -> u64 { 9 }
fn default_ice_slide() -> u64 { 2 }
fn default_boat_move() -> u32 { 7 }
fn default_speed_ticks() -> u32 { 200 }          // 10s at 50ms
fn default_invincibility_ticks() -> u32 { 200 }
fn default_bonus_seconds() -> u32 { 30 }
fn default_frog_seed() -> u64 { 0x5eed_f20c }
fn default_clicks() -> u32 { 3 }
fn default_deadline() -> u64 { 5000 }
fn default_true() -> bool { true }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming { tick_rate_ms: default_tick_rate() }
    }
}

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            player_move_interval: default_player_move(),
            speed_move_interval: default_speed_move(),
            bug_move_interval: default_bug_move(),
            pink_ball_move_interval: default_pink_ball_move(),
            frog_move_interval: default_frog_move(),
            ice_slide_interval: default_ice_slide(),
            boat_move_interval: default_boat_move(),
            speed_ticks: default_speed_ticks(),
            invincibility_ticks: default_invincibility_ticks(),
            bonus_seconds: default_bonus_seconds(),
            frog_seed: default_frog_seed(),
            extra_life_keeps_clock: default_true(),
        }
    }
}

impl Default for TomlBarnacle {
    fn default() -> Self {
        TomlBarnacle {
            clicks_required: default_clicks(),
            deadline_ms: default_deadline(),
            pause_suspends_deadline: default_true(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { levels_dir: default_levels_dir(), save_dir: None }
    }
}

impl From<TomlConfig> for GameConfig {
    fn from(t: TomlConfig) -> Self {
        GameConfig {
            timing: TimingConfig { tick_rate_ms: t.timing.tick_rate_ms.max(1) },
            rules: RulesConfig {
                player_move_interval: t.rules.player_move_interval,
                speed_move_interval: t.rules.speed_move_interval,
                bug_move_interval: t.rules.bug_move_interval.max(1),
                pink_ball_move_interval: t.rules.pink_ball_move_interval.max(1),
                frog_move_interval: t.rules.frog_move_interval.max(1),
                ice_slide_interval: t.rules.ice_slide_interval,
                boat_move_interval: t.rules.boat_move_interval,
                speed_ticks: t.rules.speed_ticks,
                invincibility_ticks: t.rules.invincibility_ticks,
                bonus_seconds: t.rules.bonus_seconds,
                frog_seed: t.rules.frog_seed,
                extra_life_keeps_clock: t.rules.extra_life_keeps_clock,
            },
            barnacle: BarnacleConfig {
                clicks_required: t.barnacle.clicks_required,
                deadline_ms: t.barnacle.deadline_ms,
                pause_suspends_deadline: t.barnacle.pause_suspends_deadline,
            },
            levels_dir: PathBuf::from(t.general.levels_dir),
            save_dir: t.general.save_dir.map(PathBuf::from),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        TomlConfig::default().into()
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, current working directory, XDG data dir.
    /// Missing file or missing keys fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let mut cfg: GameConfig = load_toml(&search_dirs).into();

        // Resolve a relative levels directory against the search dirs
        if !cfg.levels_dir.is_absolute() {
            if let Some(found) = search_dirs
                .iter()
                .map(|d| d.join(&cfg.levels_dir))
                .find(|p| p.is_dir())
            {
                cfg.levels_dir = found;
            }
        }
        cfg
    }

    /// Parse a config document directly; used by tests and tooling.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<TomlConfig>(text).map(Into::into)
    }

    /// Where save files go: `save_dir` if configured, else the XDG data dir.
    pub fn resolved_save_dir(&self) -> PathBuf {
        if let Some(dir) = &self.save_dir {
            return dir.clone();
        }
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".local/share/chipmaze/saves"),
            Err(_) => PathBuf::from("saves"),
        }
    }
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/chipmaze");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    let sys = PathBuf::from("/usr/share/chipmaze");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                Ok(cfg) => {
                    log::info!("loaded {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    log::warn!("config.toml parse error: {e}; using default settings");
                    return TomlConfig::default();
                }
            },
            Err(e) => log::warn!("could not read {}: {e}", path.display()),
        }
    }
    TomlConfig::default()
}
