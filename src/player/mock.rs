//! Scripted in-memory backend used by the engine and controller tests.
//!
//! Every call made against a session is appended to a shared journal so tests
//! can assert on ordering. Time only moves when a test calls `advance`.

use crate::{
    error::TransportError,
    player::{AudioBackend, PlaybackSession},
};
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Open(String),
    Start(String),
    Pause(String),
    Resume(String),
    Stop(String),
    SetPosition(String, Duration),
    Release(String),
}

struct SessionState {
    path: String,
    position: Duration,
    duration: Option<Duration>,
    playing: bool,
    released: bool,
}

#[derive(Default)]
struct Shared {
    journal: Vec<Call>,
    sessions: Vec<SessionState>,

    durations: HashMap<String, Option<Duration>>,
    failing_opens: HashSet<String>,
    failing_starts: HashSet<String>,
    unseekable: HashSet<String>,
    open_delay: Duration,
}

#[derive(Clone)]
pub(crate) struct MockAudio {
    shared: Arc<Mutex<Shared>>,
}

impl MockAudio {
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(180);

    pub fn new() -> Self {
        MockAudio {
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn with_duration(self, path: &str, secs: u64) -> Self {
        self.script(|s| {
            s.durations
                .insert(path.into(), Some(Duration::from_secs(secs)));
        })
    }

    pub fn with_unknown_duration(self, path: &str) -> Self {
        self.script(|s| {
            s.durations.insert(path.into(), None);
        })
    }

    pub fn fail_open(self, path: &str) -> Self {
        self.script(|s| {
            s.failing_opens.insert(path.into());
        })
    }

    pub fn fail_start(self, path: &str) -> Self {
        self.script(|s| {
            s.failing_starts.insert(path.into());
        })
    }

    pub fn unseekable(self, path: &str) -> Self {
        self.script(|s| {
            s.unseekable.insert(path.into());
        })
    }

    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.script(|s| s.open_delay = delay)
    }

    fn script(self, f: impl FnOnce(&mut Shared)) -> Self {
        f(&mut self.shared.lock().unwrap());
        self
    }

    pub fn backend(&self) -> Box<dyn AudioBackend> {
        Box::new(MockBackend {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn journal(&self) -> Vec<Call> {
        self.shared.lock().unwrap().journal.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.journal().iter().filter(|c| pred(c)).count()
    }

    pub fn opens_of(&self, path: &str) -> usize {
        self.count(|c| matches!(c, Call::Open(p) if p == path))
    }

    /// Paths of sessions that were opened and not yet released
    pub fn live_sessions(&self) -> Vec<String> {
        self.shared
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| !s.released)
            .map(|s| s.path.clone())
            .collect()
    }

    /// Move the simulated clock for every playing session.
    pub fn advance(&self, by: Duration) {
        let mut shared = self.shared.lock().unwrap();
        for session in shared.sessions.iter_mut() {
            if session.playing && !session.released {
                let next = session.position + by;
                session.position = match session.duration {
                    Some(d) => next.min(d),
                    None => next,
                };
            }
        }
    }
}

struct MockBackend {
    shared: Arc<Mutex<Shared>>,
}

impl AudioBackend for MockBackend {
    fn open(&mut self, path: &Path) -> Result<Box<dyn PlaybackSession>, TransportError> {
        let path = path.to_string_lossy().to_string();

        let delay = {
            let mut shared = self.shared.lock().unwrap();
            shared.journal.push(Call::Open(path.clone()));
            shared.open_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut shared = self.shared.lock().unwrap();
        if shared.failing_opens.contains(&path) {
            return Err(TransportError::open(&path, "scripted open failure"));
        }

        let duration = shared
            .durations
            .get(&path)
            .copied()
            .unwrap_or(Some(MockAudio::DEFAULT_DURATION));

        shared.sessions.push(SessionState {
            path: path.clone(),
            position: Duration::ZERO,
            duration,
            playing: false,
            released: false,
        });

        Ok(Box::new(MockSession {
            id: shared.sessions.len() - 1,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockSession {
    id: usize,
    shared: Arc<Mutex<Shared>>,
}

impl MockSession {
    fn with<T>(&self, f: impl FnOnce(&mut SessionState, &mut Vec<Call>) -> T) -> T {
        let mut shared = self.shared.lock().unwrap();
        let Shared {
            journal, sessions, ..
        } = &mut *shared;
        f(&mut sessions[self.id], journal)
    }
}

impl PlaybackSession for MockSession {
    fn start(&mut self) -> Result<(), TransportError> {
        let fails = {
            let shared = self.shared.lock().unwrap();
            shared.failing_starts.contains(&shared.sessions[self.id].path)
        };

        self.with(|s, journal| {
            journal.push(Call::Start(s.path.clone()));
            if fails {
                Err(TransportError::Output("scripted start failure".into()))
            } else {
                s.playing = true;
                Ok(())
            }
        })
    }

    fn pause(&mut self) {
        self.with(|s, journal| {
            journal.push(Call::Pause(s.path.clone()));
            s.playing = false;
        })
    }

    fn resume(&mut self) {
        self.with(|s, journal| {
            journal.push(Call::Resume(s.path.clone()));
            s.playing = true;
        })
    }

    fn stop(&mut self) {
        self.with(|s, journal| {
            journal.push(Call::Stop(s.path.clone()));
            s.playing = false;
        })
    }

    fn set_position(&mut self, pos: Duration) -> Result<(), TransportError> {
        let unseekable = {
            let shared = self.shared.lock().unwrap();
            shared.unseekable.contains(&shared.sessions[self.id].path)
        };

        self.with(|s, journal| {
            journal.push(Call::SetPosition(s.path.clone(), pos));
            if unseekable {
                Err(TransportError::Seek("source is not seekable".into()))
            } else {
                s.position = pos;
                Ok(())
            }
        })
    }

    fn position(&self) -> Duration {
        self.with(|s, _| if s.released { Duration::ZERO } else { s.position })
    }

    fn duration(&self) -> Option<Duration> {
        self.with(|s, _| s.duration)
    }

    fn is_finished(&self) -> bool {
        self.with(|s, _| !s.released && s.duration.is_some_and(|d| s.position >= d))
    }

    fn release(&mut self) {
        self.with(|s, journal| {
            if !s.released {
                journal.push(Call::Release(s.path.clone()));
                s.released = true;
                s.playing = false;
            }
        })
    }
}
