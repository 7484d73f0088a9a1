//! File logging for passdeck.
//!
//! Only a file logger is installed: the terminal belongs to the UI while the
//! deck is running, so nothing may write to it.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Path to the log file.
    pub path: PathBuf,
    /// Minimum log level to record.
    pub level: LevelFilter,
}

impl LogConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            level: LevelFilter::Info,
        }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }
}

/// Initializes logging with the given configuration.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    if let Some(parent) = config.path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)
        .map_err(|e| anyhow!("Failed to open log file: {}", e))?;

    let file_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .build();

    WriteLogger::init(config.level, file_config, log_file)
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    log::info!("Logging initialized at level {:?}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_info() {
        let config = LogConfig::new(PathBuf::from("/tmp/test.log"));
        assert_eq!(config.level, LevelFilter::Info);
    }

    #[test]
    fn config_level_is_adjustable() {
        let config = LogConfig::new(PathBuf::from("/tmp/test.log")).with_level(LevelFilter::Trace);
        assert_eq!(config.level, LevelFilter::Trace);
    }
}
