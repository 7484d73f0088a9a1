use log::warn;

use crate::models::{EntryList, FIELD_SEPARATOR, NAME_MAX_LEN, PASSWORD_MAX_LEN, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scene {
    #[default]
    Main,
    List,
    View,
    Edit,
    Help,
}

/// The five-key input model of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Right,
    Ok,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Short,
    Long,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key { key: Key, press: Press },
    /// Printable input for the Edit scene's active field.
    Char(char),
    Backspace,
}

/// Blink-style feedback the host surfaces after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Sent,
    Added,
    Removed,
    Rejected,
}

/// Side effects a transition asks the host to perform, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Persist,
    TypePassword(String),
    Notify(Feedback),
    Quit,
}

/// In-memory session state: current scene, selection and edit buffers.
#[derive(Debug, Default)]
pub struct Session {
    pub scene: Scene,
    pub selected: usize,
    pub editing_password: bool,
    pub name_buffer: String,
    pub password_buffer: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the selection inside `[0, len)`, or at 0 for an empty list.
    pub fn clamp_selection(&mut self, len: usize) {
        self.selected = if len == 0 {
            0
        } else {
            self.selected.min(len - 1)
        };
    }

    fn clear_buffers(&mut self) {
        self.name_buffer.clear();
        self.password_buffer.clear();
    }

    fn push_char(&mut self, c: char) {
        if c == '\n' || c.is_control() {
            return;
        }
        if self.editing_password {
            if self.password_buffer.len() + c.len_utf8() <= PASSWORD_MAX_LEN {
                self.password_buffer.push(c);
            }
        } else {
            // The separator can never be part of a stored name.
            if c == FIELD_SEPARATOR {
                return;
            }
            if self.name_buffer.len() + c.len_utf8() <= NAME_MAX_LEN {
                self.name_buffer.push(c);
            }
        }
    }

    fn pop_char(&mut self) {
        if self.editing_password {
            self.password_buffer.pop();
        } else {
            self.name_buffer.pop();
        }
    }
}

/// Advances the session by one input event, mutating the store as needed.
///
/// Returns the effects the host must apply, in order. All navigation and
/// store mutation lives here so it can be driven without a UI.
pub fn handle_event(session: &mut Session, list: &mut EntryList, event: InputEvent) -> Vec<Effect> {
    let mut effects = Vec::new();
    match event {
        InputEvent::Key {
            key,
            press: Press::Short,
        } => handle_short_press(session, list, key, &mut effects),
        InputEvent::Key {
            key,
            press: Press::Long,
        } => handle_long_press(session, list, key, &mut effects),
        InputEvent::Char(c) => {
            if session.scene == Scene::Edit {
                session.push_char(c);
            }
        }
        InputEvent::Backspace => {
            if session.scene == Scene::Edit {
                session.pop_char();
            }
        }
    }
    effects
}

fn handle_short_press(session: &mut Session, list: &mut EntryList, key: Key, effects: &mut Vec<Effect>) {
    match key {
        Key::Back => {
            if session.scene == Scene::Main {
                effects.push(Effect::Quit);
            } else {
                // Cancelled edits are discarded, never committed.
                if session.scene == Scene::Edit {
                    session.clear_buffers();
                }
                session.scene = Scene::Main;
            }
        }
        Key::Up => {
            if session.scene == Scene::List && session.selected > 0 {
                session.selected -= 1;
            }
        }
        Key::Down => {
            if session.scene == Scene::List && session.selected + 1 < list.len() {
                session.selected += 1;
            }
        }
        Key::Ok => match session.scene {
            Scene::Main => session.scene = Scene::List,
            Scene::List => {
                if !list.is_empty() {
                    session.scene = Scene::View;
                }
            }
            Scene::View => {
                if let Some(entry) = list.get(session.selected) {
                    effects.push(Effect::TypePassword(entry.password.clone()));
                    effects.push(Effect::Notify(Feedback::Sent));
                }
            }
            Scene::Edit | Scene::Help => {}
        },
        Key::Right => {
            if session.scene == Scene::Main {
                session.scene = Scene::Help;
            }
        }
    }
}

fn handle_long_press(session: &mut Session, list: &mut EntryList, key: Key, effects: &mut Vec<Effect>) {
    match key {
        Key::Ok => match session.scene {
            Scene::List => {
                session.clear_buffers();
                session.editing_password = false;
                session.scene = Scene::Edit;
            }
            Scene::View => match list.remove(session.selected) {
                Ok(()) => {
                    session.scene = Scene::List;
                    session.clamp_selection(list.len());
                    effects.push(Effect::Persist);
                    effects.push(Effect::Notify(Feedback::Removed));
                }
                Err(e) => warn!("remove rejected: {e}"),
            },
            Scene::Edit => session.editing_password = !session.editing_password,
            Scene::Main | Scene::Help => {}
        },
        Key::Back => {
            if session.scene == Scene::Edit
                && !session.name_buffer.is_empty()
                && !session.password_buffer.is_empty()
            {
                match list.add(&session.name_buffer, &session.password_buffer) {
                    Ok(()) => {
                        session.clear_buffers();
                        session.scene = Scene::List;
                        session.selected = list.len() - 1;
                        effects.push(Effect::Persist);
                        effects.push(Effect::Notify(Feedback::Added));
                    }
                    Err(StoreError::CapacityExceeded) => {
                        // Stay in Edit with the fields intact so the user
                        // can retry after freeing capacity.
                        warn!("store is full, keeping edit in progress");
                        effects.push(Effect::Notify(Feedback::Rejected));
                    }
                    Err(e) => warn!("add rejected: {e}"),
                }
            }
        }
        Key::Up | Key::Down | Key::Right => {}
    }
}
