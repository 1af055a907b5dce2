use crate::config::Settings;
use anyhow::Result;
use simplelog::{CombinedLogger, ConfigBuilder, WriteLogger};
use std::{fs::File, path::PathBuf};

/// Route the `log` macros to a file. The terminal belongs to the player while
/// it runs in raw mode, so nothing is written to stderr.
pub fn init_logging(settings: &Settings) -> Result<PathBuf> {
    let path = settings.log_file_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = ConfigBuilder::new()
        .set_thread_level(log::LevelFilter::Debug)
        .add_filter_allow_str("tuneshelf")
        .build();

    CombinedLogger::init(vec![WriteLogger::new(
        settings.level_filter(),
        config,
        File::create(&path)?,
    )])?;

    Ok(path)
}
