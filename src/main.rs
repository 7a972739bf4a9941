/// Entry point and terminal game loop.
///
/// Usage: `chipmaze [LEVEL_FILE]`. Without a file the level index is shown.
/// Logs go to stderr (`RUST_LOG=chipmaze=debug chipmaze 2> log.txt`).

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyboardEnhancementFlags, PushKeyboardEnhancementFlags, PopKeyboardEnhancementFlags};
use crossterm::execute;

use chipmaze::config::GameConfig;
use chipmaze::domain::coord::Direction;
use chipmaze::sim::event::GameEvent;
use chipmaze::sim::scheduler::RunState;
use chipmaze::sim::session::Session;
use chipmaze::ui::input::KeyTracker;
use chipmaze::ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

enum Screen {
    Select { cursor: usize },
    Playing,
}

fn main() {
    env_logger::init();
    let config = GameConfig::load();
    let mut session = Session::new(config);

    let mut screen = Screen::Select { cursor: 0 };
    if let Some(path) = std::env::args().nth(1) {
        let loaded = session
            .load(Path::new(&path), None, false)
            .and_then(|()| session.start(Instant::now()));
        if let Err(e) = loaded {
            eprintln!("Could not load {path}: {e}");
            return;
        }
        screen = Screen::Playing;
    }

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }
    let mut kb = KeyTracker::new();
    kb.honor_release = crossterm::terminal::supports_keyboard_enhancement().unwrap_or(false)
        && execute!(
            io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok();

    let result = game_loop(&mut session, &mut renderer, &mut kb, screen);

    if kb.honor_release {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_CLICK: &[KeyCode] = &[KeyCode::Char(' ')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::Char('P')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_SAVE: &[KeyCode] = &[KeyCode::F(2)];
const KEYS_NEXT: &[KeyCode] = &[KeyCode::Char('n'), KeyCode::Char('N')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::Esc];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter];

const MOVES: [(&[KeyCode], Direction); 4] = [
    (KEYS_UP, Direction::North),
    (KEYS_RIGHT, Direction::East),
    (KEYS_DOWN, Direction::South),
    (KEYS_LEFT, Direction::West),
];

fn game_loop(
    session: &mut Session,
    renderer: &mut Renderer,
    kb: &mut KeyTracker,
    mut screen: Screen,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut message = String::new();

    loop {
        kb.drain_events();
        if kb.ctrl_pressed('c') {
            break;
        }
        let now = Instant::now();

        match &mut screen {
            Screen::Select { cursor } => {
                let total = session.index().len();
                if kb.any_pressed(KEYS_QUIT) {
                    break;
                } else if kb.any_pressed(&[KeyCode::Up]) {
                    *cursor = cursor.saturating_sub(1);
                } else if kb.any_pressed(&[KeyCode::Down]) {
                    *cursor = (*cursor + 1).min(total.saturating_sub(1));
                } else if kb.any_pressed(KEYS_CONFIRM) && total > 0 {
                    let entry = session.index()[*cursor].clone();
                    match session.load_entry(&entry).and_then(|()| session.start(now)) {
                        Ok(()) => {
                            message = format!("Level {}: {}", entry.ordinal, entry.name);
                            screen = Screen::Playing;
                            renderer.invalidate();
                            continue;
                        }
                        Err(e) => log::error!("loading {}: {e}", entry.name),
                    }
                }
                renderer.render_select(session.index(), *cursor)?;
            }
            Screen::Playing => {
                if kb.any_pressed(KEYS_QUIT) {
                    if session.run_state() != RunState::Stopped {
                        session.stop()?;
                    }
                    let cursor = session.level_ordinal().map_or(0, |n| n.saturating_sub(1) as usize);
                    screen = Screen::Select { cursor };
                    renderer.invalidate();
                    continue;
                }
                handle_commands(session, kb, now, &mut message);
                feed_input(session, kb);
                match session.run_due(now) {
                    Ok(events) => describe_events(&events, &mut message),
                    Err(e) => {
                        log::error!("tick failed: {e}");
                        message = e.to_string();
                    }
                }
                renderer.render_game(session, &message, now)?;
            }
        }
        std::thread::sleep(FRAME_SLEEP);
    }
    Ok(())
}

/// Held directions and minigame clicks.
fn feed_input(session: &mut Session, kb: &KeyTracker) {
    for (keys, dir) in MOVES {
        if kb.any_pressed(keys) {
            session.direction_input(dir);
        }
        if kb.any_held(keys) {
            session.press(dir);
        } else {
            session.release(dir);
        }
    }
    for _ in 0..kb.press_count(KEYS_CLICK) {
        session.minigame_click();
    }
}

fn handle_commands(session: &mut Session, kb: &KeyTracker, now: Instant, message: &mut String) {
    let result = if kb.any_pressed(KEYS_PAUSE) {
        match session.run_state() {
            RunState::Running => session.pause(),
            RunState::Paused => session.unpause(),
            RunState::Stopped => Ok(()),
        }
    } else if kb.any_pressed(KEYS_RESTART) {
        session.restart(false).and_then(|()| {
            *message = "Level restarted".to_string();
            match session.run_state() {
                RunState::Stopped => session.start(now),
                _ => Ok(()),
            }
        })
    } else if kb.any_pressed(KEYS_SAVE) || kb.ctrl_pressed('s') {
        session.save().map(|path| *message = format!("Saved to {}", path.display()))
    } else if kb.any_pressed(KEYS_NEXT) {
        session.load_next().and_then(|()| {
            *message = format!("Level {}", session.level_name().unwrap_or("?"));
            session.start(now)
        })
    } else {
        Ok(())
    };
    if let Err(e) = result {
        log::warn!("{e}");
        *message = e.to_string();
    }
}

fn describe_events(events: &[GameEvent], message: &mut String) {
    for event in events {
        match event {
            GameEvent::ExtraLifeUsed { cause, remaining } => {
                *message = format!("{}! Extra life used, {remaining} left", cause.describe());
            }
            GameEvent::MinigameWon { .. } => *message = "Escaped the barnacle".to_string(),
            GameEvent::SocketOpened { .. } => *message = "Chip socket opened".to_string(),
            _ => {}
        }
    }
}
