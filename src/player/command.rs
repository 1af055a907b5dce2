use crate::{
    error::TransportError,
    player::{PlayerEvent, SeekOutcome, StateChange},
};
use crossbeam_channel::Sender;

/// What the engine thread reports back for one command.
pub(crate) struct Reply<T> {
    pub changes: Vec<StateChange>,
    pub result: Result<T, TransportError>,
    /// Number of events the engine had emitted when it took this command.
    /// Events numbered below it happened before the command ran.
    pub event_mark: u64,
}

impl<T> Reply<T> {
    pub fn new(changes: Vec<StateChange>, result: Result<T, TransportError>, event_mark: u64) -> Self {
        Reply {
            changes,
            result,
            event_mark,
        }
    }
}

/// An engine-originated event, numbered in emission order.
#[derive(Debug)]
pub(crate) struct Sequenced {
    pub seq: u64,
    pub event: PlayerEvent,
}

pub(crate) enum TransportCommand {
    Play(String, Sender<Reply<()>>),
    Pause(Sender<Reply<()>>),
    Stop(Sender<Reply<()>>),
    SwitchTrack(String, Sender<Reply<()>>),
    Seek(f64, Sender<Reply<SeekOutcome>>),
    Shutdown(Sender<Reply<()>>),
}
