mod backend;
mod backend_rodio;
mod command;
mod controller;
mod core;
mod handle;
mod metrics;
mod track;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::{AudioBackend, PlaybackSession, SeekOutcome};
pub use backend_rodio::{RodioBackend, decode};
pub use controller::{PlayerController, Progress};
pub use handle::{EngineConfig, TransportEngine};
pub(crate) use metrics::PlaybackMetrics;
pub use track::TrackRef;

#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum PlaybackState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl From<PlaybackState> for u8 {
    fn from(state: PlaybackState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for PlaybackState {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlaybackState::Stopped),
            1 => Ok(PlaybackState::Playing),
            2 => Ok(PlaybackState::Paused),
            _ => Err(()),
        }
    }
}

/// A single observed transition of the engine's playback state.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct StateChange {
    pub previous: PlaybackState,
    pub current: PlaybackState,
}

impl StateChange {
    pub fn new(previous: PlaybackState, current: PlaybackState) -> Self {
        StateChange { previous, current }
    }
}

/// Events raised by the engine outside of a caller's operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged(StateChange),
    TrackFinished(String),
}
