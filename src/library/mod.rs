use crate::{expand_tilde, player::TrackRef};
use anyhow::{Result, anyhow};
use log::{debug, info};
use lofty::{
    file::{AudioFile, TaggedFileExt},
    probe::Probe,
    tag::Accessor,
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};
use walkdir::WalkDir;

static LEGAL_EXTENSION: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| HashSet::from(["mp3", "m4a", "flac", "ogg", "wav"]));

/// Build a play queue from files and directories.
///
/// Directories are walked recursively and sorted by path; folders with a
/// `.nomedia` file are ignored. Explicit files with an unsupported extension
/// are skipped, but a path that does not exist is an error.
pub fn collect_tracks<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<TrackRef>> {
    let mut tracks = Vec::new();

    for raw in paths {
        let path = expand_tilde(raw.as_ref())?;

        if !path.exists() {
            return Err(anyhow!("Path does not exist! {}", raw.as_ref().display()));
        }

        match path.is_dir() {
            true => {
                let mut files: Vec<PathBuf> = collect_valid_files(&path).collect();
                files.sort();
                debug!("Found {} tracks under {}", files.len(), path.display());
                tracks.extend(files.iter().map(|f| read_track(f)));
            }
            false if has_legal_extension(&path) => tracks.push(read_track(&path)),
            false => debug!("Skipping {}", path.display()),
        }
    }

    info!("Collected {} tracks", tracks.len());
    Ok(tracks)
}

fn collect_valid_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !e.path().join(".nomedia").exists())
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_legal_extension(entry.path()))
        .map(|entry| entry.into_path())
}

fn has_legal_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LEGAL_EXTENSION.contains(ext.to_lowercase().as_str()))
}

/// Read tags into a queue entry, falling back to the file stem when the file
/// carries no usable title.
pub fn read_track(path: &Path) -> TrackRef {
    let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut track = TrackRef::new(canon.to_string_lossy(), stem);

    let tagged = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(tagged) => tagged,
        Err(e) => {
            debug!("No tags for {}: {e}", path.display());
            return track;
        }
    };

    let duration = tagged.properties().duration();
    if duration > Duration::ZERO {
        track = track.with_duration(duration);
    }

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        if let Some(title) = tag.title().filter(|t| !t.trim().is_empty()) {
            track.title = title.to_string();
        }
        if let Some(artist) = tag.artist().filter(|a| !a.trim().is_empty()) {
            track = track.with_artist(artist.to_string());
        }
    }

    track
}
