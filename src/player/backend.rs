use crate::error::TransportError;
use std::{path::Path, time::Duration};

/// Anything able to turn a path into a playable, device-bound session.
///
/// Backends live on the engine thread and are never shared, so they are not
/// required to be `Send`.
pub trait AudioBackend {
    /// Open `path` and bind it to a fresh output session.
    ///
    /// The returned session owns both the decoder and the output resources.
    /// Implementations must not leave anything attached to the device when
    /// this returns an error.
    fn open(&mut self, path: &Path) -> Result<Box<dyn PlaybackSession>, TransportError>;

    fn name(&self) -> &'static str {
        "unnamed"
    }
}

/// One decoder + output pair, created and destroyed together.
pub trait PlaybackSession {
    fn start(&mut self) -> Result<(), TransportError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);

    /// Move the decoder's read position. Sources that cannot seek return an error.
    fn set_position(&mut self, pos: Duration) -> Result<(), TransportError>;

    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;

    /// True once the source has been fully consumed by the output
    fn is_finished(&self) -> bool;

    /// Release device and decoder resources. Must be safe to call twice.
    fn release(&mut self);
}

/// Result of a seek request.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SeekOutcome {
    /// The source now reads from this (clamped) position
    Repositioned(Duration),
    /// The source rejected the request; nothing changed
    Unsupported,
    /// Nothing is loaded
    NoSource,
}

impl SeekOutcome {
    pub fn is_repositioned(&self) -> bool {
        matches!(self, SeekOutcome::Repositioned(_))
    }
}
