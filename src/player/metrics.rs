use crate::player::PlaybackState;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

/// Published snapshot of the engine, readable from any thread without
/// touching the loaded session.
pub struct PlaybackMetrics {
    state: AtomicU8,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
    current_path: Mutex<Option<String>>,
}

impl PlaybackMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(PlaybackMetrics {
            state: AtomicU8::new(PlaybackState::Stopped.into()),
            position_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
            current_path: Mutex::new(None),
        })
    }

    pub fn get_state(&self) -> PlaybackState {
        self.state
            .load(Ordering::Acquire)
            .try_into()
            .unwrap_or(PlaybackState::Stopped)
    }

    pub fn get_position(&self) -> Duration {
        Duration::from_millis(self.position_ms.load(Ordering::Acquire))
    }

    pub fn get_duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms.load(Ordering::Acquire))
    }

    pub fn current_path(&self) -> Option<String> {
        self.current_path
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn is_paused(&self) -> bool {
        PlaybackState::Paused == self.get_state()
    }

    pub fn is_stopped(&self) -> bool {
        PlaybackState::Stopped == self.get_state()
    }

    pub(crate) fn set_state(&self, state: PlaybackState) {
        self.state.store(state.into(), Ordering::Release);
    }

    pub(crate) fn set_position(&self, d: Duration) {
        self.position_ms
            .store(d.as_millis() as u64, Ordering::Release)
    }

    pub(crate) fn set_duration(&self, d: Option<Duration>) {
        let ms = d.map(|d| d.as_millis() as u64).unwrap_or(0);
        self.duration_ms.store(ms, Ordering::Release)
    }

    pub(crate) fn set_current_path(&self, path: Option<String>) {
        if let Ok(mut current) = self.current_path.lock() {
            *current = path;
        }
    }

    /// Clear position and duration; the track identity is kept.
    pub(crate) fn reset(&self) {
        self.set_position(Duration::ZERO);
        self.set_duration(None);
        self.set_state(PlaybackState::Stopped);
    }
}
