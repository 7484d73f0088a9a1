use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

/// Modifier byte values for a HID boot keyboard report.
pub const MOD_NONE: u8 = 0x00;
pub const MOD_LEFT_SHIFT: u8 = 0x02;

// HID usage ids (keyboard/keypad page) for the non-alphanumeric keys we map.
const KEY_A: u8 = 0x04;
const KEY_1: u8 = 0x1E;
const KEY_0: u8 = 0x27;
const KEY_SPACEBAR: u8 = 0x2C;
const KEY_MINUS: u8 = 0x2D;
const KEY_EQUAL: u8 = 0x2E;
const KEY_OPEN_BRACKET: u8 = 0x2F;
const KEY_CLOSE_BRACKET: u8 = 0x30;
const KEY_BACKSLASH: u8 = 0x31;
const KEY_SEMICOLON: u8 = 0x33;
const KEY_APOSTROPHE: u8 = 0x34;
const KEY_COMMA: u8 = 0x36;
const KEY_DOT: u8 = 0x37;
const KEY_SLASH: u8 = 0x38;

/// Hold time between press and release, and between successive keys.
pub const KEYSTROKE_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum KeyboardError {
    #[error("no active keyboard link")]
    LinkUnavailable,
    #[error("keyboard link error: {0}")]
    Io(#[from] std::io::Error),
}

/// One physical key: modifier byte plus usage id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystroke {
    pub modifier: u8,
    pub keycode: u8,
}

/// Maps a character to its keystroke on a US layout.
///
/// Characters outside the table (anything non-ASCII, control characters)
/// have no mapping and are skipped by the emitter.
pub fn keystroke_for(c: char) -> Option<Keystroke> {
    let (modifier, keycode) = match c {
        'a'..='z' => (MOD_NONE, KEY_A + (c as u8 - b'a')),
        'A'..='Z' => (MOD_LEFT_SHIFT, KEY_A + (c as u8 - b'A')),
        '1'..='9' => (MOD_NONE, KEY_1 + (c as u8 - b'1')),
        '0' => (MOD_NONE, KEY_0),
        ' ' => (MOD_NONE, KEY_SPACEBAR),
        '!' => (MOD_LEFT_SHIFT, KEY_1),
        '@' => (MOD_LEFT_SHIFT, KEY_1 + 1),
        '#' => (MOD_LEFT_SHIFT, KEY_1 + 2),
        '$' => (MOD_LEFT_SHIFT, KEY_1 + 3),
        '%' => (MOD_LEFT_SHIFT, KEY_1 + 4),
        '^' => (MOD_LEFT_SHIFT, KEY_1 + 5),
        '&' => (MOD_LEFT_SHIFT, KEY_1 + 6),
        '*' => (MOD_LEFT_SHIFT, KEY_1 + 7),
        '(' => (MOD_LEFT_SHIFT, KEY_1 + 8),
        ')' => (MOD_LEFT_SHIFT, KEY_0),
        '-' => (MOD_NONE, KEY_MINUS),
        '_' => (MOD_LEFT_SHIFT, KEY_MINUS),
        '=' => (MOD_NONE, KEY_EQUAL),
        '+' => (MOD_LEFT_SHIFT, KEY_EQUAL),
        '[' => (MOD_NONE, KEY_OPEN_BRACKET),
        '{' => (MOD_LEFT_SHIFT, KEY_OPEN_BRACKET),
        ']' => (MOD_NONE, KEY_CLOSE_BRACKET),
        '}' => (MOD_LEFT_SHIFT, KEY_CLOSE_BRACKET),
        '\\' => (MOD_NONE, KEY_BACKSLASH),
        '|' => (MOD_LEFT_SHIFT, KEY_BACKSLASH),
        ';' => (MOD_NONE, KEY_SEMICOLON),
        ':' => (MOD_LEFT_SHIFT, KEY_SEMICOLON),
        '\'' => (MOD_NONE, KEY_APOSTROPHE),
        '"' => (MOD_LEFT_SHIFT, KEY_APOSTROPHE),
        ',' => (MOD_NONE, KEY_COMMA),
        '<' => (MOD_LEFT_SHIFT, KEY_COMMA),
        '.' => (MOD_NONE, KEY_DOT),
        '>' => (MOD_LEFT_SHIFT, KEY_DOT),
        '/' => (MOD_NONE, KEY_SLASH),
        '?' => (MOD_LEFT_SHIFT, KEY_SLASH),
        _ => return None,
    };
    Some(Keystroke { modifier, keycode })
}

/// A host channel that can press and release one key at a time.
pub trait KeyboardLink {
    fn is_connected(&self) -> bool;
    fn press(&mut self, stroke: Keystroke) -> Result<(), KeyboardError>;
    fn release(&mut self) -> Result<(), KeyboardError>;
}

/// Types text over a [`KeyboardLink`], one key at a time.
pub struct Emitter<L> {
    link: L,
    delay: Duration,
}

impl<L: KeyboardLink> Emitter<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            delay: KEYSTROKE_DELAY,
        }
    }

    pub fn with_delay(link: L, delay: Duration) -> Self {
        Self { link, delay }
    }

    /// Emits `text` as a sequence of press/release pairs.
    ///
    /// Fails up front when no link is active; unmapped characters are
    /// omitted from the typed output. Returns how many keys were sent.
    pub fn type_string(&mut self, text: &str) -> Result<usize, KeyboardError> {
        if !self.link.is_connected() {
            return Err(KeyboardError::LinkUnavailable);
        }
        let mut sent = 0;
        for c in text.chars() {
            let Some(stroke) = keystroke_for(c) else {
                debug!("skipping character with no keyboard mapping");
                continue;
            };
            self.link.press(stroke)?;
            thread::sleep(self.delay);
            self.link.release()?;
            thread::sleep(self.delay);
            sent += 1;
        }
        info!("typed {sent} keys");
        Ok(sent)
    }
}

/// Keyboard link backed by a Linux USB gadget HID node.
///
/// The device file expects 8-byte boot keyboard input reports:
/// modifier byte, reserved byte, then up to six usage ids.
pub struct HidGadget {
    device: PathBuf,
    handle: Option<File>,
}

impl HidGadget {
    pub fn new(device: PathBuf) -> Self {
        Self {
            device,
            handle: None,
        }
    }

    fn file(&mut self) -> Result<&mut File, KeyboardError> {
        if self.handle.is_none() {
            let file = OpenOptions::new().write(true).open(&self.device)?;
            self.handle = Some(file);
        }
        match self.handle.as_mut() {
            Some(file) => Ok(file),
            None => Err(KeyboardError::LinkUnavailable),
        }
    }

    fn write_report(&mut self, report: [u8; 8]) -> Result<(), KeyboardError> {
        let file = self.file()?;
        file.write_all(&report)?;
        file.flush()?;
        Ok(())
    }
}

impl KeyboardLink for HidGadget {
    fn is_connected(&self) -> bool {
        self.handle.is_some() || self.device.exists()
    }

    fn press(&mut self, stroke: Keystroke) -> Result<(), KeyboardError> {
        self.write_report([stroke.modifier, 0, stroke.keycode, 0, 0, 0, 0, 0])
    }

    fn release(&mut self) -> Result<(), KeyboardError> {
        self.write_report([0; 8])
    }
}
