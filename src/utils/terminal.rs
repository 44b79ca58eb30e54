//! Local terminal helpers: raw mode, geometry and title sequences.
//!
//! Wraps crossterm's terminal operations. [`RawModeGuard`] restores the
//! previous mode on drop, which covers early returns and unwinding alike.

use crate::utils::error::{LwshellError, Result};
use crossterm::terminal;
use crossterm::tty::IsTty;

/// Geometry used when the local terminal size cannot be read.
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Local terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Use a probed size, or 80x24 when the probe failed or reported zero.
    pub fn or_default(probed: Option<WindowSize>) -> Self {
        probed
            .filter(|size| size.cols > 0 && size.rows > 0)
            .unwrap_or_default()
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(DEFAULT_COLS, DEFAULT_ROWS)
    }
}

/// RAII guard that restores the terminal to its original mode on drop.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().map_err(LwshellError::RawMode)?;
        tracing::debug!("Terminal switched to raw mode");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Nothing more can be done from Drop if this fails.
        let _ = terminal::disable_raw_mode();
    }
}

/// Whether standard input is attached to an interactive terminal.
pub fn stdin_is_terminal() -> bool {
    std::io::stdin().is_tty()
}

/// Current local terminal size, if it can be read.
pub fn current_size() -> Option<WindowSize> {
    terminal::size()
        .ok()
        .map(|(cols, rows)| WindowSize::new(cols, rows))
}

/// Escape sequence that sets both the window title (OSC 0) and the
/// icon/tab title (OSC 2).
pub fn title_sequence(title: &str) -> String {
    format!("\x1b]0;{title}\x07\x1b]2;{title}\x07")
}
