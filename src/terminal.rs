//! Raw-mode keyboard input.

use crossterm::event::{self, Event, KeyCode as TermKey, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use pvkeys_engine::{InputSource, KeyCode};
use std::io;

/// What a terminal key event means to the event loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Key(KeyCode),
    /// Ctrl-C: stop as if the quit key was pressed.
    Interrupt,
    Ignored,
}

/// Translate a crossterm key event.
pub fn translate(key: KeyEvent) -> KeyInput {
    // Only process key press events (Windows reports Press + Release)
    if key.kind != KeyEventKind::Press {
        return KeyInput::Ignored;
    }
    if key.code == TermKey::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyInput::Interrupt;
    }
    if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
        return KeyInput::Ignored;
    }
    match key.code {
        TermKey::Up => KeyInput::Key(KeyCode::Up),
        TermKey::Down => KeyInput::Key(KeyCode::Down),
        TermKey::Left => KeyInput::Key(KeyCode::Left),
        TermKey::Right => KeyInput::Key(KeyCode::Right),
        TermKey::Enter => KeyInput::Key(KeyCode::Enter),
        TermKey::Char(' ') => KeyInput::Key(KeyCode::Space),
        TermKey::Char(c) => KeyInput::Key(KeyCode::Char(c)),
        _ => KeyInput::Ignored,
    }
}

/// Keyboard input with the terminal in raw mode. Raw mode is switched off
/// again on drop.
pub struct TerminalInput {
    _raw: (),
}

impl TerminalInput {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(TerminalInput { _raw: () })
    }
}

impl Drop for TerminalInput {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl InputSource for TerminalInput {
    fn next_key(&mut self) -> io::Result<Option<KeyCode>> {
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            match translate(key) {
                KeyInput::Key(code) => return Ok(Some(code)),
                KeyInput::Interrupt => return Ok(None),
                KeyInput::Ignored => {}
            }
        }
    }
}
