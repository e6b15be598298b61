//! Logging initialization
//!
//! The terminal belongs to the TUI, so everything goes to a log file only.

use anyhow::Result;
use simplelog::{Config as LogConfig, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::Path;

/// Initialize the file logger.
///
/// # Arguments
/// * `log_file_path` - Path to the log file (parent directories are created)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or install the logger
pub fn init_logger(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create log directory: {}", e))?;
    }

    let log_file =
        File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    WriteLogger::init(LevelFilter::Info, LogConfig::default(), log_file)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}
