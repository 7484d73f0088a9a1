use std::process::ExitCode;

use passdeck::logging::{LogConfig, init_logging};
use passdeck::{app, storage};

fn main() -> ExitCode {
    let log_config = match storage::log_path() {
        Ok(path) => LogConfig::new(path),
        Err(e) => {
            eprintln!("passdeck: {e}");
            return ExitCode::from(1);
        }
    };
    if let Err(e) = init_logging(&log_config) {
        // A deck without a log file is still a working deck.
        eprintln!("passdeck: logging disabled: {e}");
    }

    log::info!("passdeck starting");
    if let Err(e) = app::run() {
        log::error!("fatal: {e:#}");
        eprintln!("passdeck: {e:#}");
        return ExitCode::from(1);
    }
    log::info!("passdeck exiting");
    ExitCode::SUCCESS
}
