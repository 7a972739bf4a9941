/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// Each frame is composed into `front`, compared cell by cell with `back`
/// (the previous frame), and only the changed cells are written. Commands
/// are batched with `queue!` and flushed once; then the buffers swap.
///
/// The renderer never touches the simulation. It reads the session through
/// its query methods and maps the opaque sprite keys to glyphs.

use std::io::{self, BufWriter, Write};
use std::time::Instant;

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::coord::Coord;
use crate::domain::tile::KeyColour;
use crate::sim::event::Outcome;
use crate::sim::level::IndexEntry;
use crate::sim::scheduler::RunState;
use crate::sim::session::Session;

// ── Cell ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BASE_BG: Color = Color::Rgb { r: 18, g: 20, b: 28 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Never equal to a composed cell; forces a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = if bg == Color::Reset { Self::BASE_BG } else { bg };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::Black, bg));
        }
    }
}

// ── Glyphs ──

/// Two terminal columns per map cell.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

/// Glyph pair and colours for a tile sprite key.
fn tile_glyph(sprite: &str) -> ([char; 2], Color, Color) {
    let grey = Color::Rgb { r: 60, g: 62, b: 74 };
    match sprite {
        "path" => (['·', ' '], Color::DarkGrey, Cell::BASE_BG),
        "dirt" => (['░', '░'], Color::Rgb { r: 140, g: 100, b: 60 }, Cell::BASE_BG),
        "wall" => (['█', '█'], grey, Cell::BASE_BG),
        "exit" => (['◎', ' '], Color::Green, Cell::BASE_BG),
        "water" => (['≈', '≈'], Color::Blue, Color::Rgb { r: 10, g: 30, b: 80 }),
        "button" => (['◘', ' '], Color::Red, Cell::BASE_BG),
        "button-down" => (['○', ' '], Color::DarkRed, Cell::BASE_BG),
        "trap" => (['╬', ' '], Color::Yellow, Cell::BASE_BG),
        "trap-open" => (['┼', ' '], Color::DarkYellow, Cell::BASE_BG),
        "chip-socket" => (['▣', ' '], Color::Cyan, Cell::BASE_BG),
        "door-red" => (['▓', '▓'], Color::Red, Cell::BASE_BG),
        "door-green" => (['▓', '▓'], Color::Green, Cell::BASE_BG),
        "door-yellow" => (['▓', '▓'], Color::Yellow, Cell::BASE_BG),
        "door-blue" => (['▓', '▓'], Color::Blue, Cell::BASE_BG),
        "ice" => ([' ', ' '], Color::White, Color::Rgb { r: 150, g: 200, b: 230 }),
        "ice-tl" => (['┌', ' '], Color::Black, Color::Rgb { r: 150, g: 200, b: 230 }),
        "ice-tr" => (['┐', ' '], Color::Black, Color::Rgb { r: 150, g: 200, b: 230 }),
        "ice-bl" => (['└', ' '], Color::Black, Color::Rgb { r: 150, g: 200, b: 230 }),
        "ice-br" => (['┘', ' '], Color::Black, Color::Rgb { r: 150, g: 200, b: 230 }),
        "boat-path" => (['~', ' '], Color::Cyan, Color::Rgb { r: 10, g: 30, b: 80 }),
        "boat" => (['▄', '▄'], Color::Rgb { r: 160, g: 110, b: 50 }, Color::Rgb { r: 10, g: 30, b: 80 }),
        _ => (['?', '?'], Color::Magenta, Cell::BASE_BG),
    }
}

/// Glyph and colour for actor and item sprite keys, drawn over the tile.
fn overlay_glyph(sprite: &str) -> (char, Color) {
    match sprite {
        "player" => ('☺', Color::White),
        "player-shielded" => ('☻', Color::Yellow),
        "block" => ('■', Color::Rgb { r: 170, g: 140, b: 100 }),
        "pink-ball" => ('●', Color::Magenta),
        "bug" => ('ж', Color::Red),
        "frog" => ('ƒ', Color::Green),
        "barnacle" => ('✱', Color::DarkCyan),
        "chip" => ('◆', Color::Cyan),
        "key-red" => ('⚷', Color::Red),
        "key-green" => ('⚷', Color::Green),
        "key-yellow" => ('⚷', Color::Yellow),
        "key-blue" => ('⚷', Color::Blue),
        "speed" => ('»', Color::Yellow),
        "invincibility" => ('♦', Color::White),
        "extra-life" => ('♥', Color::Red),
        "increase-time" => ('+', Color::Green),
        _ => ('?', Color::Magenta),
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;
        self.sync_size(true)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    /// Force a full repaint on the next frame (screen switch).
    pub fn invalidate(&mut self) {
        self.back.cells.fill(Cell::INVALID);
    }

    fn sync_size(&mut self, force: bool) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if force || tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.invalidate();
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }
        Ok(())
    }

    pub fn render_select(&mut self, index: &[IndexEntry], cursor: usize) -> io::Result<()> {
        self.sync_size(false)?;
        self.front.clear();
        self.compose_select(index, cursor);
        self.present()
    }

    pub fn render_game(&mut self, session: &Session, message: &str, now: Instant) -> io::Result<()> {
        self.sync_size(false)?;
        self.front.clear();
        self.compose_game(session, message, now);
        self.present()
    }

    fn present(&mut self) -> io::Result<()> {
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }
        self.writer.flush()
    }

    // ── Compose: level select ──

    fn compose_select(&mut self, index: &[IndexEntry], cursor: usize) {
        self.front.put_str(2, 1, "C H I P M A Z E", Color::Cyan, Color::Reset);
        self.front.put_str(2, 3, "Select a level", Color::Grey, Color::Reset);

        let visible = self.term_h.saturating_sub(8).max(1);
        let scroll = cursor.saturating_sub(visible - 1);
        for (row, (i, entry)) in index.iter().enumerate().skip(scroll).take(visible).enumerate() {
            let selected = i == cursor;
            let line = format!(
                "{} {:>3}. {:<32} {}",
                if selected { '▶' } else { ' ' },
                entry.ordinal,
                entry.name,
                entry.duration_label()
            );
            let (fg, bg) = if selected {
                (Color::Black, Color::Rgb { r: 90, g: 180, b: 200 })
            } else {
                (Color::White, Color::Reset)
            };
            self.front.put_str(2, 5 + row, &line, fg, bg);
        }

        let help_row = self.term_h.saturating_sub(2);
        self.front.put_str(2, help_row, "↑/↓ choose   Enter play   q quit", Color::DarkGrey, Color::Reset);
    }

    // ── Compose: game ──

    fn compose_game(&mut self, session: &Session, message: &str, now: Instant) {
        let Ok(world) = session.world() else {
            return;
        };

        // HUD
        let inv = world.inventory;
        let keys: String = KeyColour::ALL
            .iter()
            .map(|&c| if inv.keys(c) > 0 { c.letter().to_ascii_uppercase() } else { '·' })
            .collect();
        let secs = world.clock.remaining_secs();
        let hud = format!(
            " {}  ⏱ {:02}:{:02}  ◆ {}  ⚷ {}  ♥ {} ",
            session.level_name().unwrap_or("-"),
            secs / 60,
            secs % 60,
            inv.chips,
            keys,
            inv.extra_lives
        );
        self.front.fill_row(HUD_ROW, Color::Rgb { r: 40, g: 44, b: 60 });
        self.front.put_str(0, HUD_ROW, &hud, Color::White, Color::Rgb { r: 40, g: 44, b: 60 });

        // Camera: centred on the player, half-width from the level's field of view.
        let fov = session.fov().unwrap_or(4.0).max(1.0).ceil() as i32;
        let reserved = MAP_ROW + 4;
        let max_w = (self.term_w / CELL_W) as i32;
        let max_h = self.term_h.saturating_sub(reserved).max(1) as i32;
        let view_w = (2 * fov + 1).min(max_w).min(world.width);
        let view_h = (2 * fov + 1).min(max_h).min(world.height);
        let centre = world.player_pos().unwrap_or(Coord::new(world.width / 2, world.height / 2));
        let cam_x = (centre.x - view_w / 2).clamp(0, (world.width - view_w).max(0));
        let cam_y = (centre.y - view_h / 2).clamp(0, (world.height - view_h).max(0));

        for vy in 0..view_h {
            for vx in 0..view_w {
                let at = Coord::new(cam_x + vx, cam_y + vy);
                let col = vx as usize * CELL_W;
                let row = MAP_ROW + vy as usize;
                self.compose_cell(session, at, col, row);
            }
        }

        // Message bar
        let msg_row = MAP_ROW + view_h as usize + 1;
        let status = match (session.outcome(), session.run_state()) {
            (Some(Outcome::Won { remaining_secs }), _) => {
                format!("Level complete! Score {remaining_secs}   n next   r replay")
            }
            (Some(Outcome::Lost(cause)), _) => format!("{}   r retry", cause.describe()),
            (None, RunState::Paused) => "PAUSED   p resume".to_string(),
            _ => match session.minigame_time_left(now) {
                Some(ms) => format!(
                    "Caught by a barnacle! Tap space exactly {} times  ({}.{}s)",
                    session.config().barnacle.clicks_required,
                    ms / 1000,
                    (ms % 1000) / 100
                ),
                None => message.to_string(),
            },
        };
        if !status.is_empty() {
            let bg = Color::Rgb { r: 200, g: 180, b: 50 };
            self.front.fill_row(msg_row, bg);
            self.front.put_str(1, msg_row, &status, Color::Black, bg);
        }

        let help_row = msg_row + 2;
        let help = " Arrows/WASD move  Space click  p pause  r restart  F2 save  n next  q quit";
        self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
    }

    fn compose_cell(&mut self, session: &Session, at: Coord, col: usize, row: usize) {
        let Ok(Some(tile)) = session.tile_at(at) else {
            self.front.set(col, row, Cell::BLANK);
            self.front.set(col + 1, row, Cell::BLANK);
            return;
        };
        let ([a, b], fg, bg) = tile_glyph(tile.sprite());
        let overlay = match (session.actor_at(at), session.item_at(at)) {
            (Ok(Some(actor)), _) => Some(overlay_glyph(actor.sprite())),
            (_, Ok(Some(item))) => Some(overlay_glyph(item.sprite())),
            _ => None,
        };
        match overlay {
            Some((ch, ofg)) => {
                self.front.set(col, row, Cell::new(ch, ofg, bg));
                self.front.set(col + 1, row, Cell::new(' ', ofg, bg));
            }
            None => {
                self.front.set(col, row, Cell::new(a, fg, bg));
                self.front.set(col + 1, row, Cell::new(b, fg, bg));
            }
        }
    }
}
