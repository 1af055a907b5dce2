use crate::{
    error::TransportError,
    player::{AudioBackend, PlaybackSession},
};
use log::{debug, warn};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

/// Plays through the default output device. Every opened track gets its own
/// output stream, torn down together with the decoder.
#[derive(Default)]
pub struct RodioBackend;

impl RodioBackend {
    pub fn new() -> Self {
        RodioBackend
    }
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, path: &Path) -> Result<Box<dyn PlaybackSession>, TransportError> {
        // Decode first so a bad file never touches the device
        let source = decode(path)?;
        let duration = source.total_duration();

        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| TransportError::Output(e.to_string()))?;
        // rodio prints to stderr on drop otherwise, which garbles a raw-mode terminal
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        sink.pause();
        sink.append(source);

        debug!("Bound {} to a new output stream", path.display());

        Ok(Box::new(RodioSession {
            sink: Some(sink),
            stream: Some(stream),
            duration,
        }))
    }

    fn name(&self) -> &'static str {
        "rodio"
    }
}

pub struct RodioSession {
    sink: Option<Sink>,
    stream: Option<OutputStream>,
    duration: Option<Duration>,
}

impl PlaybackSession for RodioSession {
    fn start(&mut self) -> Result<(), TransportError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| TransportError::Output("session already released".into()))?;
        sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }

    // BUG: not every symphonia decoder implements seeking (OGG in particular),
    // those come back as errors and are treated as unsupported upstream.
    fn set_position(&mut self, pos: Duration) -> Result<(), TransportError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| TransportError::Seek("session already released".into()))?;
        sink.try_seek(pos)
            .map_err(|e| TransportError::Seek(e.to_string()))
    }

    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos())
            .unwrap_or_default()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn is_finished(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| sink.empty())
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        // Sink goes first, the stream it was connected to after
        if self.stream.take().is_some() {
            debug!("Output stream closed");
        }
    }
}

impl Drop for RodioSession {
    fn drop(&mut self) {
        if self.sink.is_some() {
            warn!("Session dropped without release");
            self.release();
        }
    }
}

/// Open `path` as a seekable rodio decoder.
pub fn decode(path: &Path) -> Result<Decoder<BufReader<File>>, TransportError> {
    let file = File::open(path).map_err(|e| TransportError::open(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| TransportError::open(path, e))?
        .len();

    let mut builder = Decoder::builder()
        .with_data(BufReader::new(file))
        .with_byte_len(len)
        .with_coarse_seek(true)
        .with_seekable(true);

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_lowercase();
        let hint = match ext.as_str() {
            "adif" | "adts" => "aac",
            "caf" => "audio/x-caf",
            "m4a" | "m4b" | "m4p" | "m4r" | "mp4" => "audio/mp4",
            "bit" | "mpga" => "mp3",
            "mka" | "mkv" => "audio/matroska",
            "oga" | "ogm" | "ogv" | "ogx" | "spx" => "audio/ogg",
            "wave" => "wav",
            other => other,
        };
        builder = builder.with_hint(hint);
    }

    builder.build().map_err(|e| TransportError::open(path, e))
}
