use std::time::Duration;
use xxhash_rust::xxh3::xxh3_64;

/// A queue entry: what the controller needs to play a track and label it.
#[derive(Debug, Clone)]
pub struct TrackRef {
    id: u64,
    path: String,
    pub title: String,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
}

impl PartialEq for TrackRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl TrackRef {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        let path = path.into();
        TrackRef {
            id: signature(&path),
            path,
            title: title.into(),
            artist: None,
            duration: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True when there is nothing the engine could open
    pub fn is_blank(&self) -> bool {
        self.path.trim().is_empty()
    }

    /// "Title – Artist", or just the title when the artist is unknown
    pub fn display_line(&self) -> String {
        match self.artist.as_deref().map(str::trim) {
            Some(artist) if !artist.is_empty() => format!("{} – {}", self.title, artist),
            _ => self.title.clone(),
        }
    }
}

/// Stable id derived from the path bytes
pub fn signature(path: &str) -> u64 {
    xxh3_64(path.as_bytes())
}
