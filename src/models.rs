use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Hard bound on the number of stored records.
pub const MAX_ENTRIES: usize = 50;
/// Longest stored name, in bytes.
pub const NAME_MAX_LEN: usize = 31;
/// Longest stored password, in bytes.
pub const PASSWORD_MAX_LEN: usize = 63;

/// Field separator in the persisted line format. Names must never contain it.
pub const FIELD_SEPARATOR: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record store is full ({MAX_ENTRIES} entries)")]
    CapacityExceeded,
    #[error("index {0} is out of range")]
    InvalidIndex(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Entry {
    pub name: String,
    pub password: String,
}

/// Insertion-ordered record list with a fixed capacity.
///
/// The backing storage grows on demand but never past [`MAX_ENTRIES`];
/// removed entries are zeroized when they are dropped.
#[derive(Debug, Default)]
pub struct EntryList {
    entries: Vec<Entry>,
}

impl EntryList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_ENTRIES
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Appends a record, sanitizing and truncating both fields.
    ///
    /// Names lose any `:` (it is the line-format separator) and both fields
    /// lose newlines before being cut to their byte bounds. Duplicate names
    /// are allowed.
    pub fn add(&mut self, name: &str, password: &str) -> Result<(), StoreError> {
        if self.is_full() {
            return Err(StoreError::CapacityExceeded);
        }
        let name: String = name
            .chars()
            .filter(|c| *c != FIELD_SEPARATOR && *c != '\n')
            .collect();
        let password: String = password.chars().filter(|c| *c != '\n').collect();
        self.entries.push(Entry {
            name: truncated(&name, NAME_MAX_LEN).to_string(),
            password: truncated(&password, PASSWORD_MAX_LEN).to_string(),
        });
        Ok(())
    }

    /// Removes the record at `index`, preserving the order of the rest.
    ///
    /// Callers holding a selection index must re-clamp it afterwards.
    pub fn remove(&mut self, index: usize) -> Result<(), StoreError> {
        if index >= self.entries.len() {
            return Err(StoreError::InvalidIndex(index));
        }
        // Entry is ZeroizeOnDrop, so the removed record is wiped here.
        drop(self.entries.remove(index));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Wipes every record and empties the list.
    pub fn zeroize_all(&mut self) {
        for entry in &mut self.entries {
            entry.zeroize();
        }
        self.entries.clear();
        self.entries.shrink_to_fit();
    }
}

/// Longest prefix of `s` that fits in `max` bytes, cut on a char boundary.
fn truncated(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
