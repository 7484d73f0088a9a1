//! Passdeck - a pocket password deck.
//!
//! This library holds the core of the deck: the bounded record store, the
//! line-oriented persistence layer, the scene/event state machine and the
//! USB keyboard emitter. The binary wires them to a terminal front end.

pub mod app;
pub mod keyboard;
pub mod logging;
pub mod models;
pub mod scenes;
pub mod storage;
pub mod ui;

// Re-export commonly used types
pub use keyboard::{Emitter, KeyboardLink};
pub use logging::{LogConfig, init_logging};
pub use models::{Entry, EntryList};
pub use scenes::{InputEvent, Scene, Session};
