use crate::{
    REFRESH_RATE,
    error::TransportError,
    player::{
        AudioBackend, PlaybackMetrics, PlaybackState, PlayerEvent, RodioBackend, SeekOutcome,
        StateChange,
        command::{Reply, Sequenced, TransportCommand},
        core::TransportCore,
    },
};
use crossbeam_channel::{Receiver, Sender};
use log::warn;
use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};

type Subscriber = Arc<dyn Fn(StateChange) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// How often the engine refreshes the published position while playing
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval: REFRESH_RATE,
        }
    }
}

/// Bookkeeping that keeps observers seeing transitions in the order the
/// engine made them.
///
/// Every operation gets a ticket while it still holds the op guard, so
/// tickets follow execution order. Batches are handed to observers strictly
/// by ticket.
#[derive(Default)]
struct Delivery {
    /// Engine events not yet assigned to a batch
    pending: VecDeque<Sequenced>,
    /// Events already delivered, waiting to be handed out by `poll_events`
    drained: Vec<PlayerEvent>,
    next_ticket: u64,
    serving: u64,
    deliverer: Option<ThreadId>,
}

struct Batch {
    /// `None` when raised from inside an observer; those run inline
    ticket: Option<u64>,
    changes: Vec<StateChange>,
}

/// Single-track transport. Mutating calls block until the engine thread has
/// finished them; at most one runs at a time. Accessors read a published
/// snapshot and never wait on a mutation.
pub struct TransportEngine {
    commands: Sender<TransportCommand>,
    events: Receiver<Sequenced>,
    metrics: Arc<PlaybackMetrics>,

    op_guard: Mutex<()>,
    delivery: Mutex<Delivery>,
    turn: Condvar,
    subscribers: Mutex<Vec<Subscriber>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TransportEngine {
    /// Spawn an engine on the default output device.
    pub fn spawn(config: EngineConfig) -> Result<Self, TransportError> {
        Self::spawn_with(config, || Ok(Box::new(RodioBackend::new()) as Box<dyn AudioBackend>))
    }

    /// Spawn an engine whose backend is produced by `factory` on the engine thread.
    pub fn spawn_with<F>(config: EngineConfig, factory: F) -> Result<Self, TransportError>
    where
        F: FnOnce() -> Result<Box<dyn AudioBackend>, TransportError> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (evt_tx, evt_rx) = crossbeam_channel::unbounded();
        let metrics = PlaybackMetrics::new();

        let thread = TransportCore::spawn(
            Box::new(factory),
            cmd_rx,
            evt_tx,
            Arc::clone(&metrics),
            config.poll_interval,
        )?;

        Ok(Self {
            commands: cmd_tx,
            events: evt_rx,
            metrics,

            op_guard: Mutex::new(()),
            delivery: Mutex::new(Delivery::default()),
            turn: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Register an observer for state transitions. Observers run on the thread
    /// whose call caused the transition, after the engine has settled, so they
    /// may call back into the engine or subscribe further observers.
    pub fn subscribe(&self, observer: impl Fn(StateChange) + Send + Sync + 'static) {
        lock(&self.subscribers).push(Arc::new(observer));
    }
}

// =====================
//    COMMAND HANDLER
// =====================
impl TransportEngine {
    pub fn play(&self, path: &str) -> Result<(), TransportError> {
        let path = path.to_string();
        self.request(|reply| TransportCommand::Play(path, reply))
    }

    pub fn pause(&self) -> Result<(), TransportError> {
        self.request(TransportCommand::Pause)
    }

    pub fn stop(&self) -> Result<(), TransportError> {
        self.request(TransportCommand::Stop)
    }

    pub fn switch_track(&self, path: &str) -> Result<(), TransportError> {
        let path = path.to_string();
        self.request(|reply| TransportCommand::SwitchTrack(path, reply))
    }

    pub fn seek(&self, target_secs: f64) -> Result<SeekOutcome, TransportError> {
        self.request(|reply| TransportCommand::Seek(target_secs, reply))
    }

    /// Stop playback, release every resource and end the engine thread.
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        let Some(handle) = lock(&self.thread).take() else {
            return;
        };

        if let Err(e) = self.request(TransportCommand::Shutdown) {
            warn!("Engine was already gone at shutdown: {e}");
        }
        if handle.join().is_err() {
            warn!("Transport engine thread panicked");
        }
    }

    /// Drain events raised by the engine on its own (end of track, etc.).
    /// Transitions among them that no operation has delivered yet reach
    /// subscribers here.
    pub fn poll_events(&self) -> Vec<PlayerEvent> {
        let guard = lock(&self.op_guard);
        let batch = self.batch(None, Vec::new());
        drop(guard);

        self.deliver(batch);
        std::mem::take(&mut lock(&self.delivery).drained)
    }

    fn request<T>(
        &self,
        build: impl FnOnce(Sender<Reply<T>>) -> TransportCommand,
    ) -> Result<T, TransportError> {
        let guard = lock(&self.op_guard);

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands.send(build(reply_tx))?;
        let reply = reply_rx.recv()?;

        let batch = self.batch(Some(reply.event_mark), reply.changes);
        drop(guard);

        self.deliver(batch);
        reply.result
    }

    /// Must be called with the op guard held. Engine events numbered below
    /// `mark` go ahead of `changes`; later ones wait for the next batch.
    fn batch(&self, mark: Option<u64>, changes: Vec<StateChange>) -> Batch {
        let mut delivery = lock(&self.delivery);
        delivery.pending.extend(self.events.try_iter());

        let mut ordered = Vec::with_capacity(changes.len());
        while delivery
            .pending
            .front()
            .is_some_and(|e| mark.is_none_or(|m| e.seq < m))
        {
            let Some(Sequenced { event, .. }) = delivery.pending.pop_front() else {
                break;
            };
            if let PlayerEvent::StateChanged(change) = &event {
                ordered.push(*change);
            }
            delivery.drained.push(event);
        }
        ordered.extend(changes);

        let ticket = match delivery.deliverer == Some(thread::current().id()) {
            true => None,
            false => {
                let ticket = delivery.next_ticket;
                delivery.next_ticket += 1;
                Some(ticket)
            }
        };

        Batch {
            ticket,
            changes: ordered,
        }
    }

    fn deliver(&self, batch: Batch) {
        let Some(ticket) = batch.ticket else {
            self.notify(&batch.changes);
            return;
        };

        let mut delivery = lock(&self.delivery);
        while delivery.serving != ticket {
            delivery = self
                .turn
                .wait(delivery)
                .unwrap_or_else(PoisonError::into_inner);
        }
        delivery.deliverer = Some(thread::current().id());
        drop(delivery);

        // Hands the turn on even if an observer panics
        let _turn = Turn(self);
        self.notify(&batch.changes);
    }

    fn notify(&self, changes: &[StateChange]) {
        if changes.is_empty() {
            return;
        }

        let subscribers: Vec<Subscriber> = lock(&self.subscribers).clone();
        for change in changes {
            for observer in &subscribers {
                observer(*change);
            }
        }
    }
}

struct Turn<'a>(&'a TransportEngine);

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let mut delivery = lock(&self.0.delivery);
        delivery.deliverer = None;
        delivery.serving += 1;
        drop(delivery);
        self.0.turn.notify_all();
    }
}

// ===============
//    ACCESSORS
// ===============
impl TransportEngine {
    pub fn state(&self) -> PlaybackState {
        self.metrics.get_state()
    }

    pub fn current_path(&self) -> Option<String> {
        self.metrics.current_path()
    }

    pub fn position(&self) -> Duration {
        self.metrics.get_position()
    }

    pub fn duration(&self) -> Duration {
        self.metrics.get_duration()
    }

    pub fn position_seconds(&self) -> f64 {
        self.position().as_secs_f64()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration().as_secs_f64()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == PlaybackState::Stopped
    }
}

impl Drop for TransportEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
