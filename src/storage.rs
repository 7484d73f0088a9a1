use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EntryList, FIELD_SEPARATOR, StoreError};

pub const STORE_DIR: &str = ".passdeck";
pub const STORE_FILE: &str = "passwords.txt";
pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "passdeck.log";

/// Default USB gadget node used for keyboard emission.
pub const DEFAULT_HID_DEVICE: &str = "/dev/hidg0";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
}

#[derive(Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store_dir: Option<String>,
    #[serde(default)]
    pub hid_device: Option<String>,
}

pub fn default_base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(STORE_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(default_base_dir()?.join(CONFIG_FILE))
}

pub fn load_config() -> Result<Option<Config>> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let cfg: Config = serde_json::from_str(&raw)?;
    Ok(Some(cfg))
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            restrict_dir(parent)?;
        }
    }
    let data = serde_json::to_string_pretty(cfg)?;
    atomic_write(path.as_path(), data.as_bytes()).map_err(|e| anyhow!("{e}"))?;
    restrict_file(path.as_path()).map_err(|e| anyhow!("{e}"))?;
    Ok(())
}

fn configured_base_dir() -> Result<PathBuf> {
    if let Some(cfg) = load_config()? {
        if let Some(dir) = cfg.store_dir {
            return validate_configured_store_dir(Path::new(&dir));
        }
    }
    default_base_dir()
}

pub fn store_path() -> Result<PathBuf> {
    Ok(configured_base_dir()?.join(STORE_FILE))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(default_base_dir()?.join(LOG_FILE))
}

pub fn hid_device_path() -> Result<PathBuf> {
    if let Some(cfg) = load_config()? {
        if let Some(dev) = cfg.hid_device {
            return Ok(PathBuf::from(dev));
        }
    }
    Ok(PathBuf::from(DEFAULT_HID_DEVICE))
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(parent) => {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                restrict_dir(parent)?;
            }
            Ok(())
        }
        None => Err(StorageError::Unavailable(std::io::Error::other(
            "store path has no parent directory",
        ))),
    }
}

/// Reads the record store from its line-oriented on-disk form.
///
/// An absent file is a valid initial state and yields an empty list. Lines
/// without a separator are skipped; loading stops quietly once the list is
/// full. The list is parsed into fresh storage, so a failure never corrupts
/// entries the caller already holds.
pub fn load_entries(path: &Path) -> Result<EntryList, StorageError> {
    ensure_parent_dir(path)?;

    if !path.exists() {
        info!("{} not found, starting with an empty store", path.display());
        return Ok(EntryList::new());
    }

    let raw = fs::read_to_string(path)?;
    let mut list = EntryList::new();
    for line in raw.lines() {
        let Some((name, password)) = line.split_once(FIELD_SEPARATOR) else {
            warn!("skipping malformed store line (no separator)");
            continue;
        };
        match list.add(name, password) {
            Ok(()) => {}
            Err(StoreError::CapacityExceeded) => {
                warn!("store is full, loaded {} records", list.len());
                break;
            }
            Err(e) => {
                warn!("skipping store line: {e}");
            }
        }
    }
    info!("loaded {} records from {}", list.len(), path.display());
    Ok(list)
}

/// Writes the record store, one `name:password` line per entry, atomically.
pub fn save_entries(path: &Path, list: &EntryList) -> Result<(), StorageError> {
    ensure_parent_dir(path)?;

    let mut data = String::new();
    for entry in list.iter() {
        data.push_str(&entry.name);
        data.push(FIELD_SEPARATOR);
        data.push_str(&entry.password);
        data.push('\n');
    }
    atomic_write(path, data.as_bytes())?;
    restrict_file(path)?;
    info!("saved {} records to {}", list.len(), path.display());
    Ok(())
}

fn validate_configured_store_dir(raw: &Path) -> Result<PathBuf> {
    if raw.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(anyhow!(
            "Configured store path is invalid: parent traversal is not allowed"
        ));
    }
    if raw.is_absolute() {
        return Ok(raw.to_path_buf());
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(raw))
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::Unavailable(std::io::Error::other("invalid target path")))?;
    if !parent.exists() {
        fs::create_dir_all(parent)?;
        restrict_dir(parent)?;
    }

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| StorageError::Unavailable(e.error))?;
    Ok(())
}

fn restrict_file(path: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms)?;
        }
    }
    // On non-Unix platforms we skip explicit chmod; rely on platform defaults.
    Ok(())
}

fn restrict_dir(path: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.exists() {
            let perms = fs::Permissions::from_mode(0o700);
            fs::set_permissions(path, perms)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MAX_ENTRIES, NAME_MAX_LEN, PASSWORD_MAX_LEN};
    use tempfile::TempDir;

    fn store_file(dir: &TempDir) -> PathBuf {
        dir.path().join("passwords.txt")
    }

    #[test]
    fn load_missing_file_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let list = load_entries(&store_file(&dir)).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn load_creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("passwords.txt");
        let list = load_entries(&path).unwrap();
        assert!(list.is_empty());
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn save_then_load_round_trips_in_order() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        let mut list = EntryList::new();
        list.add("site", "pw123").unwrap();
        list.add("other", "secret").unwrap();
        save_entries(&path, &list).unwrap();

        let loaded = load_entries(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0).unwrap().name, "site");
        assert_eq!(loaded.get(0).unwrap().password, "pw123");
        assert_eq!(loaded.get(1).unwrap().name, "other");
        assert_eq!(loaded.get(1).unwrap().password, "secret");
    }

    #[test]
    fn empty_list_saves_an_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        save_entries(&path, &EntryList::new()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(load_entries(&path).unwrap().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        fs::write(&path, "first:pw1\nno separator here\nsecond:pw2\n").unwrap();
        let list = load_entries(&path).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().name, "first");
        assert_eq!(list.get(1).unwrap().name, "second");
    }

    #[test]
    fn load_splits_on_the_first_separator() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        fs::write(&path, "a:b:c\n").unwrap();
        let list = load_entries(&path).unwrap();
        assert_eq!(list.get(0).unwrap().name, "a");
        assert_eq!(list.get(0).unwrap().password, "b:c");
    }

    #[test]
    fn colon_in_password_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        let mut list = EntryList::new();
        list.add("site", "pa:ss:wd").unwrap();
        save_entries(&path, &list).unwrap();
        let loaded = load_entries(&path).unwrap();
        assert_eq!(loaded.get(0).unwrap().name, "site");
        assert_eq!(loaded.get(0).unwrap().password, "pa:ss:wd");
    }

    #[test]
    fn load_stops_at_capacity_without_error() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        let mut data = String::new();
        for i in 0..MAX_ENTRIES + 10 {
            data.push_str(&format!("site{i}:pw{i}\n"));
        }
        fs::write(&path, data).unwrap();
        let list = load_entries(&path).unwrap();
        assert_eq!(list.len(), MAX_ENTRIES);
        assert_eq!(list.get(MAX_ENTRIES - 1).unwrap().name, "site49");
    }

    #[test]
    fn overlong_fields_are_truncated_on_load() {
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        let name = "n".repeat(NAME_MAX_LEN + 5);
        let pw = "p".repeat(PASSWORD_MAX_LEN + 5);
        fs::write(&path, format!("{name}:{pw}\n")).unwrap();
        let list = load_entries(&path).unwrap();
        assert_eq!(list.get(0).unwrap().name.len(), NAME_MAX_LEN);
        assert_eq!(list.get(0).unwrap().password.len(), PASSWORD_MAX_LEN);
    }

    #[cfg(unix)]
    #[test]
    fn saved_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = store_file(&dir);
        let mut list = EntryList::new();
        list.add("site", "pw").unwrap();
        save_entries(&path, &list).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
