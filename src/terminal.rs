use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{ExecutableCommand, QueueableCommand};
use tracing::warn;
use unicode_width::UnicodeWidthStr;

use pacman_engine::chase::GhostKind;
use pacman_engine::components::{Dir, PelletKind};
use pacman_engine::{Appearance, KeySource, LevelReport, Outcome, Sprite, World};

/// Terminal columns per board tile.
const CELL_W: usize = 2;
const DEFAULT_RENDER_FPS: u64 = 30;

/// Raw mode plus the alternate screen, restored on drop even when the game
/// loop bails out early.
pub struct Screen {
    out: Stdout,
}

impl Screen {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        out.execute(EnterAlternateScreen)?.execute(Hide)?;
        Ok(Self { out })
    }

    pub fn out(&mut self) -> &mut Stdout {
        &mut self.out
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let restored = self
            .out
            .execute(Show)
            .and_then(|out| out.execute(LeaveAlternateScreen))
            .and_then(|_| terminal::disable_raw_mode());
        if let Err(err) = restored {
            warn!(error = %err, "failed to restore the terminal");
        }
    }
}

/// What one board tile looks like on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Cell {
    text: &'static str,
    color: Color,
}

impl Cell {
    const BLANK: Cell = Cell {
        text: "  ",
        color: Color::Reset,
    };

    const fn new(text: &'static str, color: Color) -> Self {
        Self { text, color }
    }

    fn for_appearance(appearance: Appearance) -> Self {
        match appearance.sprite {
            Sprite::Wall => Cell::new("██", Color::Blue),
            Sprite::Gate => Cell::new("==", Color::Cyan),
            Sprite::Pellet(PelletKind::Normal) => Cell::new("·", Color::White),
            Sprite::Pellet(PelletKind::Power) => Cell::new("●", Color::Magenta),
            Sprite::Pacman => Cell::new("😃", Color::Yellow),
            Sprite::Dying => Cell::new("😵", Color::Yellow),
            Sprite::Ghost(kind) => Cell::new("👻", ghost_color(kind)),
            Sprite::Frightened => Cell::new("😱", Color::Blue),
            // Alternates white and blue while the power runs out.
            Sprite::Flickering if appearance.frame % 2 == 0 => Cell::new("😱", Color::White),
            Sprite::Flickering => Cell::new("😱", Color::Blue),
            Sprite::Eyes => Cell::new("👀", Color::White),
        }
    }

    /// Spaces needed after the text to fill the tile.
    fn padding(&self) -> usize {
        CELL_W.saturating_sub(self.text.width())
    }

    fn queue(&self, out: &mut Stdout, x: u16, y: u16) -> io::Result<()> {
        out.queue(MoveTo(x, y))?
            .queue(SetForegroundColor(self.color))?
            .queue(Print(self.text))?
            .queue(Print(" ".repeat(self.padding())))?
            .queue(ResetColor)?;
        Ok(())
    }
}

fn ghost_color(kind: GhostKind) -> Color {
    match kind {
        GhostKind::Blinky => Color::Red,
        GhostKind::Pinky => Color::Magenta,
        GhostKind::Inky => Color::Cyan,
        GhostKind::Clyde => Color::DarkYellow,
    }
}

/// Top-left screen corner of the board, centred in the terminal. `None`
/// when the terminal cannot fit the board plus the score line above it.
fn board_origin(cols: usize, rows: usize, term: (u16, u16)) -> Option<(u16, u16)> {
    let width = u16::try_from(cols * CELL_W).ok()?;
    let height = u16::try_from(rows + 2).ok()?;
    let (term_w, term_h) = term;
    if term_w < width || term_h < height {
        return None;
    }
    Some(((term_w - width) / 2, (term_h - height) / 2 + 1))
}

/// Redraws only the tiles that changed since the previous frame.
pub struct Renderer {
    cols: usize,
    rows: usize,
    shown: Vec<Cell>,
    shown_score: Option<u32>,
    origin: Option<(u16, u16)>,
}

impl Renderer {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            shown: vec![Cell::BLANK; cols * rows],
            shown_score: None,
            origin: None,
        }
    }

    pub fn render(&mut self, out: &mut Stdout, world: &World) -> io::Result<()> {
        let Some(origin) = board_origin(self.cols, self.rows, terminal::size()?) else {
            self.origin = None;
            out.queue(Clear(ClearType::All))?
                .queue(MoveTo(0, 0))?
                .queue(Print(format!(
                    "Enlarge the terminal to {}x{} to see the board.",
                    self.cols * CELL_W,
                    self.rows + 2
                )))?;
            return out.flush();
        };
        let repaint = self.origin != Some(origin);
        if repaint {
            out.queue(Clear(ClearType::All))?;
            self.origin = Some(origin);
            self.shown_score = None;
        }
        let (x0, y0) = origin;

        let score = world.score();
        if self.shown_score != Some(score) {
            out.queue(MoveTo(x0, y0 - 1))?
                .queue(SetForegroundColor(Color::White))?
                .queue(Print(format!("Score: {score}  (q to quit)")))?
                .queue(ResetColor)?;
            self.shown_score = Some(score);
        }

        // Appearances arrive lowest layer first, so the last one per tile wins.
        let cols = self.cols;
        let mut frame = vec![Cell::BLANK; cols * self.rows];
        world.draw(|pos, appearance| {
            if let Some(cell) = frame.get_mut(pos.row * cols + pos.col) {
                *cell = Cell::for_appearance(appearance);
            }
        });

        for (idx, (cell, shown)) in frame.into_iter().zip(self.shown.iter_mut()).enumerate() {
            if repaint || cell != *shown {
                *shown = cell;
                let x = x0 + (idx % cols * CELL_W) as u16;
                let y = y0 + (idx / cols) as u16;
                cell.queue(out, x, y)?;
            }
        }
        out.flush()
    }

    /// Prints the outcome under the board and blocks until 'q' is pressed.
    pub fn render_report(&self, out: &mut Stdout, report: &LevelReport) -> io::Result<()> {
        let verdict = match report.outcome {
            Outcome::Won => "Board cleared",
            Outcome::Lost => "Caught",
            Outcome::Aborted => return Ok(()),
        };
        let (x, y) = match self.origin {
            Some((x0, y0)) => (x0, y0 + self.rows as u16),
            None => (0, 1),
        };
        out.queue(MoveTo(x, y))?.queue(Print(format!(
            "{verdict}! Final score {}. Press q to leave.",
            report.score
        )))?;
        out.flush()?;
        wait_for_quit()
    }
}

fn wait_for_quit() -> io::Result<()> {
    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && key.code == KeyCode::Char('q') {
                return Ok(());
            }
        }
    }
}

/// Keyboard reader handed to the level's input sampler. 'q' raises `quit`
/// instead of steering.
pub struct TerminalKeys {
    quit: Arc<AtomicBool>,
}

impl TerminalKeys {
    pub fn new(quit: Arc<AtomicBool>) -> Self {
        Self { quit }
    }

    fn read_key(&mut self) -> io::Result<Option<Dir>> {
        let mut pressed = None;
        while event::poll(Duration::from_millis(0))? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                continue;
            }
            match key.code {
                KeyCode::Char('q') => self.quit.store(true, Ordering::Release),
                KeyCode::Char('k') | KeyCode::Up => pressed = Some(Dir::Up),
                KeyCode::Char('j') | KeyCode::Down => pressed = Some(Dir::Down),
                KeyCode::Char('h') | KeyCode::Left => pressed = Some(Dir::Left),
                KeyCode::Char('l') | KeyCode::Right => pressed = Some(Dir::Right),
                _ => {}
            }
        }
        Ok(pressed)
    }
}

impl KeySource for TerminalKeys {
    fn poll(&mut self) -> Option<Dir> {
        match self.read_key() {
            Ok(pressed) => pressed,
            Err(err) => {
                warn!(error = %err, "terminal input failed, quitting");
                self.quit.store(true, Ordering::Release);
                None
            }
        }
    }
}

pub fn read_render_fps() -> u64 {
    std::env::var("PACMAN_FPS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RENDER_FPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPRITES: [Sprite; 11] = [
        Sprite::Wall,
        Sprite::Gate,
        Sprite::Pellet(PelletKind::Normal),
        Sprite::Pellet(PelletKind::Power),
        Sprite::Pacman,
        Sprite::Dying,
        Sprite::Ghost(GhostKind::Blinky),
        Sprite::Frightened,
        Sprite::Flickering,
        Sprite::Eyes,
        Sprite::Ghost(GhostKind::Clyde),
    ];

    #[test]
    fn every_sprite_fills_exactly_one_tile() {
        for sprite in SPRITES {
            let cell = Cell::for_appearance(Appearance::fixed(sprite, 0));
            assert_eq!(cell.text.width() + cell.padding(), CELL_W, "{sprite:?}");
        }
        assert_eq!(Cell::BLANK.text.width(), CELL_W);
    }

    #[test]
    fn flickering_alternates_colors() {
        let mut appearance = Appearance::fixed(Sprite::Flickering, 0);
        let even = Cell::for_appearance(appearance);
        appearance.frame = 1;
        let odd = Cell::for_appearance(appearance);
        assert_eq!(even.text, odd.text);
        assert_ne!(even.color, odd.color);
    }

    #[test]
    fn board_is_centred_below_the_score_line() {
        assert_eq!(board_origin(10, 8, (40, 20)), Some((10, 6)));
        assert_eq!(board_origin(10, 8, (19, 20)), None);
        assert_eq!(board_origin(10, 8, (40, 9)), None);
    }
}
