use crate::{
    DurationStyle,
    error::TransportError,
    get_readable_duration,
    player::{
        AudioBackend, PlaybackMetrics, PlaybackSession, PlaybackState, PlayerEvent, SeekOutcome,
        StateChange,
        command::{Reply, Sequenced, TransportCommand},
    },
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::{
    path::Path,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

pub(crate) type BackendFactory =
    Box<dyn FnOnce() -> Result<Box<dyn AudioBackend>, TransportError> + Send>;

/// The session currently bound to the output, together with the path it was
/// opened from. Dropping it releases the session.
struct LoadedSource {
    path: String,
    session: Box<dyn PlaybackSession>,
}

impl LoadedSource {
    fn new(path: &str, session: Box<dyn PlaybackSession>) -> Self {
        LoadedSource {
            path: path.to_string(),
            session,
        }
    }
}

impl Drop for LoadedSource {
    fn drop(&mut self) {
        self.session.release();
        debug!("Released session for {}", self.path);
    }
}

pub(crate) struct TransportCore {
    backend: Box<dyn AudioBackend>,
    commands: Receiver<TransportCommand>,
    events: Sender<Sequenced>,
    emitted: u64,
    metrics: Arc<PlaybackMetrics>,
    poll_interval: Duration,

    state: PlaybackState,
    loaded: Option<LoadedSource>,
    current_path: Option<String>,
}

impl TransportCore {
    /// Start the engine thread. The backend is built on that thread; a factory
    /// error is returned here and the thread is not left running.
    pub fn spawn(
        factory: BackendFactory,
        commands: Receiver<TransportCommand>,
        events: Sender<Sequenced>,
        metrics: Arc<PlaybackMetrics>,
        poll_interval: Duration,
    ) -> Result<JoinHandle<()>, TransportError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("tuneshelf-transport".into())
            .spawn(move || {
                let backend = match factory() {
                    Ok(backend) => {
                        let _ = ready_tx.send(Ok(()));
                        backend
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                info!("Transport engine started with {} backend", backend.name());
                let mut core = TransportCore::new(backend, commands, events, metrics, poll_interval);
                core.run();
                info!("Transport engine stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(TransportError::EngineClosed)
            }
        }
    }

    pub(crate) fn new(
        backend: Box<dyn AudioBackend>,
        commands: Receiver<TransportCommand>,
        events: Sender<Sequenced>,
        metrics: Arc<PlaybackMetrics>,
        poll_interval: Duration,
    ) -> Self {
        TransportCore {
            backend,
            commands,
            events,
            emitted: 0,
            metrics,
            poll_interval,

            state: PlaybackState::Stopped,
            loaded: None,
            current_path: None,
        }
    }

    fn run(&mut self) {
        loop {
            match self.commands.recv_timeout(self.poll_interval) {
                Ok(cmd) => {
                    if !self.process_command(cmd) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.stop(&mut Vec::new());
                    break;
                }
            }

            self.check_track_end();
            self.update_metrics();
        }
    }

    /// Returns false once the engine has been asked to shut down.
    fn process_command(&mut self, cmd: TransportCommand) -> bool {
        match cmd {
            TransportCommand::Play(path, reply) => {
                self.respond(reply, |core, changes| core.play(&path, changes))
            }
            TransportCommand::Pause(reply) => self.respond(reply, |core, changes| {
                core.pause(changes);
                Ok(())
            }),
            TransportCommand::Stop(reply) => self.respond(reply, |core, changes| {
                core.stop(changes);
                Ok(())
            }),
            TransportCommand::SwitchTrack(path, reply) => {
                self.respond(reply, |core, changes| core.switch_track(&path, changes))
            }
            TransportCommand::Seek(target, reply) => {
                self.respond(reply, |core, _| Ok(core.seek(target)))
            }
            TransportCommand::Shutdown(reply) => {
                self.respond(reply, |core, changes| {
                    core.stop(changes);
                    Ok(())
                });
                return false;
            }
        }
        true
    }

    fn respond<T>(
        &mut self,
        reply: Sender<Reply<T>>,
        op: impl FnOnce(&mut Self, &mut Vec<StateChange>) -> Result<T, TransportError>,
    ) {
        // Ops never emit events themselves, so the mark splits the event
        // stream cleanly into before and after this command
        let event_mark = self.emitted;
        let mut changes = Vec::new();
        let result = op(self, &mut changes);
        let _ = reply.send(Reply::new(changes, result, event_mark));
    }
}

// =====================
//    STATE MACHINE
// =====================
impl TransportCore {
    pub(crate) fn play(
        &mut self,
        path: &str,
        changes: &mut Vec<StateChange>,
    ) -> Result<(), TransportError> {
        if path.trim().is_empty() {
            return Ok(());
        }

        if self.state == PlaybackState::Paused && self.is_current(path) {
            if let Some(loaded) = self.loaded.as_mut() {
                loaded.session.resume();
                self.set_state(PlaybackState::Playing, changes);
                return Ok(());
            }
        }

        self.teardown();

        match self.load(path) {
            Ok(()) => {
                self.set_state(PlaybackState::Playing, changes);
                Ok(())
            }
            Err(e) => {
                error!("Failed to load {path}: {e}");
                self.current_path = None;
                self.metrics.set_current_path(None);
                self.metrics.reset();
                self.set_state(PlaybackState::Stopped, changes);
                Err(e)
            }
        }
    }

    pub(crate) fn pause(&mut self, changes: &mut Vec<StateChange>) {
        if self.state != PlaybackState::Playing {
            return;
        }

        if let Some(loaded) = self.loaded.as_mut() {
            loaded.session.pause();
            self.publish_position();
            self.set_state(PlaybackState::Paused, changes);
        }
    }

    pub(crate) fn stop(&mut self, changes: &mut Vec<StateChange>) {
        if self.state == PlaybackState::Stopped && self.loaded.is_none() {
            return;
        }

        self.teardown();
        self.metrics.reset();
        self.set_state(PlaybackState::Stopped, changes);
    }

    /// Always a full reload, even when `path` is the track already loaded.
    pub(crate) fn switch_track(
        &mut self,
        path: &str,
        changes: &mut Vec<StateChange>,
    ) -> Result<(), TransportError> {
        self.stop(changes);
        self.play(path, changes)
    }

    pub(crate) fn seek(&mut self, target_secs: f64) -> SeekOutcome {
        let was_playing = self.state == PlaybackState::Playing;

        let Some(loaded) = self.loaded.as_mut() else {
            return SeekOutcome::NoSource;
        };

        let Some(target) = clamp_target(target_secs, loaded.session.duration()) else {
            warn!("Seek target {target_secs} is not representable for {}", loaded.path);
            return SeekOutcome::Unsupported;
        };

        debug!(
            "Seek requested={target_secs} clamped={} playing={was_playing}",
            get_readable_duration(target, DurationStyle::CompactMillis)
        );

        // Repositioning a live output clicks, so the output is held while the
        // decoder moves.
        if was_playing {
            loaded.session.pause();
        }
        let result = loaded.session.set_position(target);
        if was_playing {
            loaded.session.resume();
        }

        match result {
            Ok(()) => {
                self.metrics.set_position(target);
                SeekOutcome::Repositioned(target)
            }
            Err(e) => {
                warn!("Seek unsupported for {}: {e}", loaded.path);
                SeekOutcome::Unsupported
            }
        }
    }

    #[cfg(test)]
    fn state(&self) -> PlaybackState {
        self.state
    }

    fn load(&mut self, path: &str) -> Result<(), TransportError> {
        // The previous pair must already be gone
        debug_assert!(self.loaded.is_none());

        let session = self.backend.open(Path::new(path))?;
        let mut loaded = LoadedSource::new(path, session);
        loaded.session.start()?;

        let duration = loaded.session.duration();
        self.loaded = Some(loaded);
        self.current_path = Some(path.to_string());

        self.metrics.set_current_path(Some(path.to_string()));
        self.metrics.set_duration(duration);
        self.metrics.set_position(Duration::ZERO);

        match duration {
            Some(d) => info!("Loaded {path} ({})", get_readable_duration(d, DurationStyle::Clean)),
            None => info!("Loaded {path} (unknown duration)"),
        }
        Ok(())
    }

    /// Stop and release the loaded pair, if any.
    fn teardown(&mut self) {
        if let Some(mut loaded) = self.loaded.take() {
            loaded.session.stop();
        }
    }

    fn set_state(&mut self, next: PlaybackState, changes: &mut Vec<StateChange>) {
        if self.state == next {
            return;
        }

        let change = StateChange::new(self.state, next);
        debug!("State {:?} -> {:?}", change.previous, change.current);

        self.state = next;
        self.metrics.set_state(next);
        changes.push(change);
    }

    fn is_current(&self, path: &str) -> bool {
        self.current_path
            .as_deref()
            .is_some_and(|current| current.to_lowercase() == path.to_lowercase())
    }
}

// =====================
//    PERIODIC WORK
// =====================
impl TransportCore {
    fn check_track_end(&mut self) {
        let finished = self.state == PlaybackState::Playing
            && self
                .loaded
                .as_ref()
                .is_some_and(|loaded| loaded.session.is_finished());

        if !finished {
            return;
        }

        let path = self.current_path.clone().unwrap_or_default();
        info!("Reached end of {path}");

        let mut changes = Vec::new();
        self.stop(&mut changes);

        for change in changes {
            self.emit(PlayerEvent::StateChanged(change));
        }
        self.emit(PlayerEvent::TrackFinished(path));
    }

    fn update_metrics(&mut self) {
        if self.state == PlaybackState::Playing {
            self.publish_position();
        }
    }

    fn publish_position(&self) {
        if let Some(loaded) = &self.loaded {
            let position = loaded.session.position();
            let bounded = match loaded.session.duration() {
                Some(duration) => position.min(duration),
                None => position,
            };
            self.metrics.set_position(bounded);
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        let seq = self.emitted;
        self.emitted += 1;
        let _ = self.events.send(Sequenced { seq, event });
    }
}

/// Clamp a requested position into `[0, duration]`. NaN and negative targets
/// become zero. Without a known duration only the lower bound applies.
pub(crate) fn clamp_target(target_secs: f64, duration: Option<Duration>) -> Option<Duration> {
    let lower = target_secs.max(0.0);
    let secs = match duration {
        Some(d) => lower.min(d.as_secs_f64()),
        None => lower,
    };
    Duration::try_from_secs_f64(secs).ok()
}
