use crate::{
    error::TransportError,
    player::{PlaybackState, PlayerEvent, SeekOutcome, TrackRef, TransportEngine},
};
use log::{info, warn};
use rand::seq::SliceRandom;
use std::{sync::Arc, time::Duration};

/// Snapshot for a progress display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub state: PlaybackState,
    pub position: Duration,
    pub duration: Duration,
}

impl Progress {
    /// Position as a 0.0..=1.0 fraction of the duration
    pub fn fraction(&self) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.position.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// Queue navigation on top of a [`TransportEngine`].
pub struct PlayerController {
    engine: Arc<TransportEngine>,
    queue: Vec<TrackRef>,
    index: Option<usize>,
    playlist: Option<String>,
    auto_advance: bool,
}

impl PlayerController {
    pub fn new(engine: Arc<TransportEngine>) -> Self {
        PlayerController {
            engine,
            queue: Vec::new(),
            index: None,
            playlist: None,
            auto_advance: false,
        }
    }

    pub fn with_auto_advance(mut self, enabled: bool) -> Self {
        self.auto_advance = enabled;
        self
    }

    pub fn engine(&self) -> &Arc<TransportEngine> {
        &self.engine
    }

    pub fn queue(&self) -> &[TrackRef] {
        &self.queue
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn now_playing(&self) -> Option<&TrackRef> {
        self.index.and_then(|i| self.queue.get(i))
    }

    /// Replace the queue and start playing from `index` (0 if out of range).
    pub fn start_from(
        &mut self,
        tracks: Vec<TrackRef>,
        index: usize,
        playlist: Option<String>,
    ) -> Result<(), TransportError> {
        self.queue = tracks;
        self.playlist = playlist;
        self.index = match self.queue.is_empty() {
            true => None,
            false if index < self.queue.len() => Some(index),
            false => Some(0),
        };

        match self.now_playing() {
            Some(track) if !track.is_blank() => self.engine.switch_track(track.path()),
            _ => Ok(()),
        }
    }

    pub fn play_pause(&mut self) -> Result<(), TransportError> {
        let Some(track) = self.now_playing().filter(|t| !t.is_blank()) else {
            return Ok(());
        };

        match self.engine.state() {
            PlaybackState::Playing => self.engine.pause(),
            PlaybackState::Stopped | PlaybackState::Paused => self.engine.play(track.path()),
        }
    }

    pub fn stop(&mut self) -> Result<(), TransportError> {
        self.engine.stop()
    }

    pub fn can_next(&self) -> bool {
        matches!(self.index, Some(i) if i + 1 < self.queue.len())
    }

    pub fn can_previous(&self) -> bool {
        matches!(self.index, Some(i) if i > 0 && !self.queue.is_empty())
    }

    /// Returns whether the controller moved to the next track
    pub fn next(&mut self) -> Result<bool, TransportError> {
        match self.index {
            Some(i) if self.can_next() => self.switch_to(i + 1),
            _ => Ok(false),
        }
    }

    /// Returns whether the controller moved to the previous track
    pub fn previous(&mut self) -> Result<bool, TransportError> {
        match self.index {
            Some(i) if self.can_previous() => self.switch_to(i - 1),
            _ => Ok(false),
        }
    }

    /// The index only moves once the engine has taken the new track.
    fn switch_to(&mut self, target: usize) -> Result<bool, TransportError> {
        let Some(track) = self.queue.get(target) else {
            return Ok(false);
        };

        if track.is_blank() {
            warn!("Track {} has no file path, not switching", track.title);
            return Ok(false);
        }

        self.engine.switch_track(track.path())?;
        info!("Now playing [{}] {}", target, track.display_line());
        self.index = Some(target);
        Ok(true)
    }

    pub fn seek_to(&self, secs: f64) -> Result<SeekOutcome, TransportError> {
        self.engine.seek(secs)
    }

    /// Seek relative to the current position
    pub fn seek_by(&self, delta_secs: f64) -> Result<SeekOutcome, TransportError> {
        self.engine.seek(self.engine.position_seconds() + delta_secs)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            state: self.engine.state(),
            position: self.engine.position(),
            duration: self.engine.duration(),
        }
    }

    /// Two display lines: the track, and where it is playing from
    pub fn display_lines(&self) -> (String, String) {
        match self.now_playing() {
            None => ("No track selected".to_string(), String::new()),
            Some(track) => (
                track.display_line(),
                self.playlist
                    .clone()
                    .unwrap_or_else(|| "Library".to_string()),
            ),
        }
    }

    /// Drain engine events; with auto-advance on, a finished track moves the
    /// queue forward.
    pub fn handle_events(&mut self) -> Result<Vec<PlayerEvent>, TransportError> {
        let events = self.engine.poll_events();

        // Only the track still selected counts; a user switch may have moved on
        let finished = self.now_playing().is_some_and(|track| {
            events
                .iter()
                .any(|e| matches!(e, PlayerEvent::TrackFinished(path) if path == track.path()))
        });

        if finished && self.engine.is_stopped() && self.auto_advance && self.can_next() {
            self.next()?;
        }

        Ok(events)
    }

    /// Shuffle the queue, keeping the current track at the front.
    pub fn shuffle(&mut self) {
        let mut rng = rand::rng();

        match self.index {
            Some(i) if i < self.queue.len() => {
                let current = self.queue.remove(i);
                self.queue.shuffle(&mut rng);
                self.queue.insert(0, current);
                self.index = Some(0);
            }
            _ => self.queue.shuffle(&mut rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{
        EngineConfig,
        mock::{Call, MockAudio},
    };
    use std::time::Instant;

    fn controller(audio: &MockAudio) -> PlayerController {
        let audio = audio.clone();
        let config = EngineConfig {
            poll_interval: Duration::from_millis(5),
        };
        let engine = TransportEngine::spawn_with(config, move || Ok(audio.backend())).unwrap();
        PlayerController::new(Arc::new(engine))
    }

    fn tracks(paths: &[&str]) -> Vec<TrackRef> {
        paths
            .iter()
            .map(|p| TrackRef::new(*p, p.trim_end_matches(".mp3")))
            .collect()
    }

    #[test]
    fn start_from_plays_requested_index() {
        let audio = MockAudio::new();
        let mut ctl = controller(&audio);

        ctl.start_from(tracks(&["a.mp3", "b.mp3", "c.mp3"]), 1, None)
            .unwrap();

        assert_eq!(ctl.index(), Some(1));
        assert_eq!(ctl.engine().current_path().as_deref(), Some("b.mp3"));
        assert!(ctl.can_next());
        assert!(ctl.can_previous());
    }

    #[test]
    fn start_from_out_of_range_falls_back_to_first() {
        let audio = MockAudio::new();
        let mut ctl = controller(&audio);

        ctl.start_from(tracks(&["a.mp3", "b.mp3"]), 7, Some("Road trip".into()))
            .unwrap();

        assert_eq!(ctl.index(), Some(0));
        assert_eq!(
            ctl.display_lines(),
            ("a".to_string(), "Road trip".to_string())
        );
    }

    #[test]
    fn empty_queue_has_no_navigation() {
        let audio = MockAudio::new();
        let mut ctl = controller(&audio);

        ctl.start_from(Vec::new(), 0, None).unwrap();

        assert_eq!(ctl.index(), None);
        assert!(!ctl.can_next());
        assert!(!ctl.can_previous());
        assert!(!ctl.next().unwrap());
        assert!(!ctl.previous().unwrap());
        ctl.play_pause().unwrap();
        assert!(audio.journal().is_empty());
        assert_eq!(ctl.display_lines().0, "No track selected");
    }

    #[test]
    fn next_and_previous_walk_the_queue() {
        let audio = MockAudio::new();
        let mut ctl = controller(&audio);
        ctl.start_from(tracks(&["a.mp3", "b.mp3", "c.mp3"]), 0, None)
            .unwrap();

        assert!(!ctl.can_previous());
        assert!(ctl.next().unwrap());
        assert!(ctl.next().unwrap());
        assert!(!ctl.can_next());
        assert!(!ctl.next().unwrap());
        assert_eq!(ctl.index(), Some(2));
        assert_eq!(ctl.engine().current_path().as_deref(), Some("c.mp3"));

        assert!(ctl.previous().unwrap());
        assert_eq!(ctl.index(), Some(1));
        assert_eq!(audio.live_sessions(), vec!["b.mp3".to_string()]);
    }

    #[test]
    fn blank_neighbour_does_not_move_index() {
        let audio = MockAudio::new();
        let mut ctl = controller(&audio);
        let mut queue = tracks(&["a.mp3"]);
        queue.push(TrackRef::new("", "Missing file"));
        ctl.start_from(queue, 0, None).unwrap();

        assert!(ctl.can_next());
        assert!(!ctl.next().unwrap());

        assert_eq!(ctl.index(), Some(0));
        assert_eq!(ctl.engine().state(), PlaybackState::Playing);
    }

    #[test]
    fn failed_switch_keeps_index() {
        let audio = MockAudio::new().fail_open("b.mp3");
        let mut ctl = controller(&audio);
        ctl.start_from(tracks(&["a.mp3", "b.mp3"]), 0, None).unwrap();

        assert!(ctl.next().is_err());

        assert_eq!(ctl.index(), Some(0));
        assert_eq!(ctl.engine().state(), PlaybackState::Stopped);
    }

    #[test]
    fn play_pause_cycles_without_reopening() {
        let audio = MockAudio::new();
        let mut ctl = controller(&audio);
        ctl.start_from(tracks(&["a.mp3"]), 0, None).unwrap();

        ctl.play_pause().unwrap();
        assert_eq!(ctl.progress().state, PlaybackState::Paused);

        ctl.play_pause().unwrap();
        assert_eq!(ctl.progress().state, PlaybackState::Playing);
        assert_eq!(audio.opens_of("a.mp3"), 1);

        ctl.stop().unwrap();
        ctl.play_pause().unwrap();
        assert_eq!(audio.opens_of("a.mp3"), 2);
    }

    #[test]
    fn seek_by_is_relative_to_position() {
        let audio = MockAudio::new().with_duration("a.mp3", 100);
        let mut ctl = controller(&audio);
        ctl.start_from(tracks(&["a.mp3"]), 0, None).unwrap();

        ctl.seek_to(40.0).unwrap();
        let outcome = ctl.seek_by(-5.0).unwrap();

        assert_eq!(outcome, SeekOutcome::Repositioned(Duration::from_secs(35)));
        assert_eq!(
            audio.journal().last(),
            Some(&Call::Resume("a.mp3".into()))
        );
        assert!((ctl.progress().fraction() - 0.35).abs() < 1e-6);
    }

    #[test]
    fn auto_advance_moves_on_when_a_track_ends() {
        let audio = MockAudio::new().with_duration("a.mp3", 1);
        let mut ctl = controller(&audio).with_auto_advance(true);
        ctl.start_from(tracks(&["a.mp3", "b.mp3"]), 0, None).unwrap();

        audio.advance(Duration::from_secs(2));

        let deadline = Instant::now() + Duration::from_secs(2);
        while ctl.index() != Some(1) && Instant::now() < deadline {
            ctl.handle_events().unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(ctl.index(), Some(1));
        assert_eq!(ctl.engine().current_path().as_deref(), Some("b.mp3"));
        assert_eq!(ctl.engine().state(), PlaybackState::Playing);
    }

    #[test]
    fn finished_track_the_user_already_left_does_not_advance() {
        let audio = MockAudio::new().with_duration("a.mp3", 1);
        let mut ctl = controller(&audio).with_auto_advance(true);
        ctl.start_from(tracks(&["a.mp3", "b.mp3", "c.mp3"]), 0, None).unwrap();

        audio.advance(Duration::from_secs(2));
        let deadline = Instant::now() + Duration::from_secs(2);
        while !ctl.engine().is_stopped() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(ctl.engine().is_stopped());

        assert!(ctl.next().unwrap());
        assert_eq!(ctl.index(), Some(1));

        let events = ctl.handle_events().unwrap();
        assert!(events.contains(&PlayerEvent::TrackFinished("a.mp3".into())));
        assert_eq!(ctl.index(), Some(1));
        assert_eq!(ctl.engine().current_path().as_deref(), Some("b.mp3"));
    }

    #[test]
    fn shuffle_keeps_current_track_first() {
        let audio = MockAudio::new();
        let mut ctl = controller(&audio);
        let queue = tracks(&["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"]);
        ctl.start_from(queue.clone(), 3, None).unwrap();

        ctl.shuffle();

        assert_eq!(ctl.index(), Some(0));
        assert_eq!(ctl.queue()[0].path(), "d.mp3");
        assert_eq!(ctl.queue().len(), queue.len());
        assert!(queue.iter().all(|t| ctl.queue().contains(t)));
    }

    #[test]
    fn progress_fraction_handles_zero_duration() {
        let progress = Progress {
            state: PlaybackState::Stopped,
            position: Duration::from_secs(3),
            duration: Duration::ZERO,
        };
        assert_eq!(progress.fraction(), 0.0);
    }
}
