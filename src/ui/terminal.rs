//! Full-screen terminal surface using crossterm.
//!
//! Keys 1-8 are the action buttons, `q`, Esc and Ctrl+C quit. The status screen
//! is redrawn from scratch every tick on the alternate screen.

use std::io::{Stdout, Write, stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use tracing::debug;

use super::{Button, ControlSurface, status_lines};
use crate::session::SessionStatus;

/// Map a key press to a button.
fn map_key(key: KeyEvent) -> Option<Button> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(Button::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Button::Quit),
        KeyCode::Char(c @ '1'..='8') => Some(Button::Action(c as u8 - b'0')),
        _ => None,
    }
}

/// Raw-mode terminal; restores the terminal when dropped.
pub struct TerminalSurface {
    out: Stdout,
}

impl TerminalSurface {
    /// Switch the terminal to raw mode on the alternate screen.
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen, Hide).context("Failed to enter alternate screen")?;
        debug!("Terminal surface ready");
        Ok(Self { out })
    }
}

impl ControlSurface for TerminalSurface {
    fn poll(&mut self) -> Result<Option<Button>> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && let Some(button) = map_key(key)
            {
                return Ok(Some(button));
            }
        }
        Ok(None)
    }

    fn render(&mut self, status: &SessionStatus) -> Result<()> {
        for (row, line) in status_lines(status).into_iter().enumerate() {
            queue!(self.out, MoveTo(0, row as u16), Print(line), Clear(ClearType::UntilNewLine))?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}
