use std::path::PathBuf;

/// Errors surfaced by the transport engine and its backends.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The resource could not be opened or decoded
    #[error("Could not open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    /// The output device or session failed
    #[error("Audio output error: {0}")]
    Output(String),

    /// The source refused to reposition
    #[error("Seek error: {0}")]
    Seek(String),

    /// The engine thread has shut down
    #[error("Transport engine is closed")]
    EngineClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TransportError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for TransportError {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        TransportError::EngineClosed
    }
}

impl From<crossbeam_channel::RecvError> for TransportError {
    fn from(_: crossbeam_channel::RecvError) -> Self {
        TransportError::EngineClosed
    }
}
