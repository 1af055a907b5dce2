use anyhow::{Result, anyhow};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};
use log::{debug, error, info};
use std::{path::PathBuf, sync::Arc};
use tuneshelf::{
    DurationStyle, PlaybackState, PlayerController, REFRESH_RATE, TransportEngine, TransportError,
    config::Settings, get_readable_duration, library, logging::init_logging, overwrite_line,
    player::PlayerEvent, truncate_at_last_space,
};

#[derive(Parser)]
#[command(name = "tuneshelf")]
#[command(about = "Minimal terminal music player")]
#[command(version)]
struct Cli {
    /// Audio files or folders to queue
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,
    /// Shuffle the queue before playing
    #[arg(long)]
    shuffle: bool,
    /// Queue position to start from (0-based)
    #[arg(long, default_value_t = 0)]
    start: usize,
    /// Move on to the next track when one ends
    #[arg(long)]
    auto_advance: bool,
}

enum Action {
    TogglePause,
    Stop,
    PlayNext,
    PlayPrev,
    SeekForward,
    SeekBack,
    Quit,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let log_path = init_logging(&settings)?;
    info!("Logging to {}", log_path.display());

    let tracks = library::collect_tracks(&cli.paths)?;
    if tracks.is_empty() {
        return Err(anyhow!("No playable files found"));
    }

    let engine = TransportEngine::spawn(settings.engine_config())?;
    let mut player = PlayerController::new(Arc::new(engine))
        .with_auto_advance(cli.auto_advance || settings.auto_advance);

    // The requested track plays first, the rest of the queue is shuffled around it
    player.start_from(tracks, cli.start, None)?;
    if cli.shuffle {
        player.shuffle();
    }

    let raw = RawMode::enable()?;
    let result = run(&mut player, &settings);

    player.engine().shutdown();
    drop(raw);
    overwrite_line("Thank you for using tuneshelf!\n")?;

    result
}

fn run(player: &mut PlayerController, settings: &Settings) -> Result<()> {
    let step = settings.seek_step().as_secs_f64();

    loop {
        for event in player.handle_events()? {
            if let PlayerEvent::TrackFinished(path) = event {
                info!("Finished {path}");
            }
        }

        if let Some(key) = next_key()? {
            let Some(action) = handle_key_event(key) else {
                continue;
            };

            let outcome = match action {
                Action::Quit => break,
                Action::TogglePause => player.play_pause(),
                Action::Stop => player.stop(),
                Action::PlayNext => player.next().map(|_| ()),
                Action::PlayPrev => player.previous().map(|_| ()),
                Action::SeekForward => seek_by(player, step),
                Action::SeekBack => seek_by(player, -step),
            };

            if let Err(e) = outcome {
                error!("{e}");
            }
        }

        overwrite_line(&status_line(player))?;
    }

    Ok(())
}

fn seek_by(player: &PlayerController, delta: f64) -> Result<(), TransportError> {
    let outcome = player.seek_by(delta)?;
    if !outcome.is_repositioned() {
        debug!("Seek by {delta}s had no effect: {outcome:?}");
    }
    Ok(())
}

fn next_key() -> Result<Option<KeyEvent>> {
    match event::poll(REFRESH_RATE)? {
        true => match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
            _ => Ok(None),
        },
        false => Ok(None),
    }
}

fn handle_key_event(key: KeyEvent) -> Option<Action> {
    use KeyCode::*;

    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, Char('c')) => Some(Action::Quit),
        (_, Char('q')) => Some(Action::Quit),
        (_, Char(' ')) => Some(Action::TogglePause),
        (_, Char('s')) => Some(Action::Stop),
        (_, Char('n')) => Some(Action::PlayNext),
        (_, Char('p')) => Some(Action::PlayPrev),
        (_, Right) => Some(Action::SeekForward),
        (_, Left) => Some(Action::SeekBack),
        _ => None,
    }
}

fn status_line(player: &PlayerController) -> String {
    let progress = player.progress();
    let (title, source) = player.display_lines();

    let icon = match progress.state {
        PlaybackState::Playing => "▶",
        PlaybackState::Paused => "⏸",
        PlaybackState::Stopped => "■",
    };

    let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
    let clock = format!(
        "{} / {}",
        get_readable_duration(progress.position, DurationStyle::Compact),
        get_readable_duration(progress.duration, DurationStyle::Compact),
    );
    let label = match source.is_empty() {
        true => title,
        false => format!("{title} ({source})"),
    };
    let room = width.saturating_sub(clock.chars().count() + 4).max(1);

    format!("{icon} {}  {clock}", truncate_at_last_space(&label, room))
}

/// Raw mode for the lifetime of the value
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
