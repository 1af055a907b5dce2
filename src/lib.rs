use anyhow::{Result, anyhow};
use crossterm::{
    ExecutableCommand,
    cursor::MoveToColumn,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

pub mod config;
pub mod error;
pub mod library;
pub mod logging;
pub mod player;

pub use error::TransportError;
pub use player::{PlaybackState, PlayerController, TransportEngine};

// ~30fps
pub const REFRESH_RATE: Duration = Duration::from_millis(33);

pub enum DurationStyle {
    Clean,
    Compact,
    CompactMillis,
}

pub fn get_readable_duration(duration: Duration, style: DurationStyle) -> String {
    let mut secs = duration.as_secs();
    let millis = duration.subsec_millis() / 10;
    let mins = secs / 60;
    secs %= 60;

    match style {
        DurationStyle::Clean => match mins {
            0 => format!("{secs:02}s"),
            _ => format!("{mins}m {secs:02}s"),
        },
        DurationStyle::Compact => format!("{mins}:{secs:02}"),
        DurationStyle::CompactMillis => format!("{mins}:{secs:02}.{millis:02}"),
    }
}

/// Cut `s` to at most `limit` characters, preferring a word boundary, and
/// mark the cut with an ellipsis.
pub fn truncate_at_last_space(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }

    let head: String = s.chars().take(limit).collect();
    let cut = match head.rfind(' ') {
        Some(space) => &head[..space],
        // No space to break on, drop the last visible char for the ellipsis
        None => {
            let last = head.char_indices().last().map(|(i, _)| i).unwrap_or(0);
            &head[..last]
        }
    };

    format!("{cut}…")
}

/// Replace the current terminal line with `message`
pub fn overwrite_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout
        .execute(MoveToColumn(0))?
        .execute(Clear(ClearType::CurrentLine))?
        .execute(Print(message))?;
    stdout.flush()
}

pub fn expand_tilde<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return Ok(path.to_path_buf());
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory!"))?;

    if path_str == "~" {
        return Ok(home);
    }

    if path_str.starts_with("~/") || path_str.starts_with("~\\") {
        return Ok(home.join(&path_str[2..]));
    }

    Err(anyhow!("Error expanding path with tilde (~): {path_str}"))
}
