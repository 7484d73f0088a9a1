use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};
use zeroize::Zeroize;

use crate::keyboard::{Emitter, HidGadget};
use crate::models::EntryList;
use crate::scenes::{self, Effect, Feedback, InputEvent, Key, Press, Session};
use crate::storage;
use crate::ui::{ViewState, draw};

/// Capacity of the input hand-off queue.
const EVENT_QUEUE_DEPTH: usize = 8;
/// How long the loop waits for input before refreshing the display.
const POLL_WAIT: Duration = Duration::from_millis(100);
const STATUS_MESSAGE_SECS: u64 = 2;

const NAV_HINT: &str = "Arrows move | Enter: Ok | Tab: long Ok | Esc: Back | Ctrl-S: long Back";

/// Transient status line with blink-style feedback coloring.
struct StatusLine {
    text: String,
    until: Option<Instant>,
    feedback: Option<Feedback>,
}

impl StatusLine {
    fn new() -> Self {
        Self {
            text: NAV_HINT.to_string(),
            until: None,
            feedback: None,
        }
    }

    fn set(&mut self, text: String, feedback: Option<Feedback>) {
        self.text = text;
        self.feedback = feedback;
        self.until = Some(Instant::now() + Duration::from_secs(STATUS_MESSAGE_SECS));
    }

    fn tick(&mut self) {
        if let Some(until) = self.until {
            if Instant::now() >= until {
                self.text = NAV_HINT.to_string();
                self.until = None;
                self.feedback = None;
            }
        }
    }
}

pub fn run() -> Result<()> {
    let store_file = storage::store_path()?;

    // A broken store degrades to an empty in-memory list; the deck stays
    // usable, it just cannot persist until the storage recovers.
    let mut list = match storage::load_entries(&store_file) {
        Ok(list) => list,
        Err(e) => {
            warn!("load failed ({e}), starting with an empty in-memory store");
            EntryList::new()
        }
    };

    let hid_device = storage::hid_device_path()?;
    let mut emitter = Emitter::new(HidGadget::new(hid_device));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, crossterm::cursor::Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let rx = spawn_input_thread();

    let mut session = Session::new();
    let mut status = StatusLine::new();

    let result = (|| -> Result<()> {
        loop {
            status.tick();

            terminal.draw(|f| {
                let view = ViewState {
                    session: &session,
                    list: &list,
                    status: status.text.clone(),
                    feedback: status.feedback,
                };
                draw(f, &view);
            })?;

            let input = match rx.recv_timeout(POLL_WAIT) {
                Ok(input) => input,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("input source closed, shutting down");
                    break;
                }
            };

            let effects = scenes::handle_event(&mut session, &mut list, input);
            let mut quit = false;
            // An error from an earlier effect wins over the action's own
            // notification, so a failed emission never reads as success.
            let mut suppress_notify = false;
            for effect in effects {
                match effect {
                    Effect::Persist => {
                        if let Err(e) = storage::save_entries(&store_file, &list) {
                            error!("save failed: {e}");
                            status.set(format!("Save failed: {e}"), Some(Feedback::Rejected));
                            suppress_notify = true;
                        }
                    }
                    Effect::TypePassword(mut password) => {
                        if let Err(e) = emitter.type_string(&password) {
                            warn!("keyboard emission skipped: {e}");
                            status.set(
                                "No USB keyboard link".to_string(),
                                Some(Feedback::Rejected),
                            );
                            suppress_notify = true;
                        }
                        password.zeroize();
                    }
                    Effect::Notify(feedback) => {
                        if !suppress_notify {
                            status.set(feedback_message(feedback).to_string(), Some(feedback));
                        }
                    }
                    Effect::Quit => quit = true,
                }
            }
            if quit {
                break;
            }
        }
        Ok(())
    })();

    // Final persist and teardown run on every exit path.
    if let Err(e) = storage::save_entries(&store_file, &list) {
        error!("final save failed: {e}");
    } else {
        info!("store persisted on shutdown");
    }

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        crossterm::cursor::Show
    )
    .ok();
    terminal.show_cursor().ok();

    zeroize_sensitive(&mut list, &mut session);
    result
}

fn zeroize_sensitive(list: &mut EntryList, session: &mut Session) {
    list.zeroize_all();
    session.name_buffer.zeroize();
    session.password_buffer.zeroize();
}

fn feedback_message(feedback: Feedback) -> &'static str {
    match feedback {
        Feedback::Sent => "Password typed over USB",
        Feedback::Added => "Entry added",
        Feedback::Removed => "Entry deleted",
        Feedback::Rejected => "Store is full",
    }
}

/// Reads terminal input on its own thread and hands events to the loop
/// through a bounded queue; a full queue drops the event.
fn spawn_input_thread() -> mpsc::Receiver<InputEvent> {
    let (tx, rx) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
    thread::spawn(move || input_loop(tx));
    rx
}

fn input_loop(tx: SyncSender<InputEvent>) {
    loop {
        let raw = match event::read() {
            Ok(raw) => raw,
            Err(e) => {
                error!("input read failed: {e}");
                return;
            }
        };
        let Event::Key(key_event) = raw else { continue };
        if key_event.kind == KeyEventKind::Release {
            continue;
        }
        let Some(input) = translate_key(key_event.code, key_event.modifiers) else {
            continue;
        };
        match tx.try_send(input) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("input queue full, dropping event"),
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

/// Maps terminal keys onto the device's five-key short/long input model.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<InputEvent> {
    let device_key = |key, press| InputEvent::Key { key, press };
    let input = match code {
        KeyCode::Up => device_key(Key::Up, Press::Short),
        KeyCode::Down => device_key(Key::Down, Press::Short),
        KeyCode::Right => device_key(Key::Right, Press::Short),
        KeyCode::Enter => device_key(Key::Ok, Press::Short),
        KeyCode::Tab => device_key(Key::Ok, Press::Long),
        KeyCode::Esc => device_key(Key::Back, Press::Short),
        KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => {
            device_key(Key::Back, Press::Long)
        }
        KeyCode::Backspace => InputEvent::Backspace,
        KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => InputEvent::Char(c),
        _ => return None,
    };
    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_and_enter_map_to_short_presses() {
        assert_eq!(
            translate_key(KeyCode::Up, KeyModifiers::NONE),
            Some(InputEvent::Key {
                key: Key::Up,
                press: Press::Short
            })
        );
        assert_eq!(
            translate_key(KeyCode::Enter, KeyModifiers::NONE),
            Some(InputEvent::Key {
                key: Key::Ok,
                press: Press::Short
            })
        );
        assert_eq!(
            translate_key(KeyCode::Esc, KeyModifiers::NONE),
            Some(InputEvent::Key {
                key: Key::Back,
                press: Press::Short
            })
        );
    }

    #[test]
    fn tab_and_ctrl_s_map_to_long_presses() {
        assert_eq!(
            translate_key(KeyCode::Tab, KeyModifiers::NONE),
            Some(InputEvent::Key {
                key: Key::Ok,
                press: Press::Long
            })
        );
        assert_eq!(
            translate_key(KeyCode::Char('s'), KeyModifiers::CONTROL),
            Some(InputEvent::Key {
                key: Key::Back,
                press: Press::Long
            })
        );
    }

    #[test]
    fn printable_keys_become_text_input() {
        assert_eq!(
            translate_key(KeyCode::Char('s'), KeyModifiers::NONE),
            Some(InputEvent::Char('s'))
        );
        assert_eq!(
            translate_key(KeyCode::Char('A'), KeyModifiers::SHIFT),
            Some(InputEvent::Char('A'))
        );
        assert_eq!(
            translate_key(KeyCode::Backspace, KeyModifiers::NONE),
            Some(InputEvent::Backspace)
        );
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert_eq!(translate_key(KeyCode::Left, KeyModifiers::NONE), None);
        assert_eq!(translate_key(KeyCode::Char('q'), KeyModifiers::CONTROL), None);
        assert_eq!(translate_key(KeyCode::F(1), KeyModifiers::NONE), None);
    }
}
