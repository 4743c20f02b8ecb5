use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{info, warn};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::error::{Error, Result};

/// Plays back a previously persisted generation through the default output.
///
/// This is the separate "play last generated file" path: it decodes the
/// canonical WAV through rodio and has nothing to do with the streaming
/// pipeline. At most one player instance is live at a time; starting a new
/// one stops and releases the previous instance first.
pub struct FilePlayer {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
}

impl FilePlayer {
    pub fn new() -> Self {
        Self {
            stream: None,
            sink: None,
        }
    }

    pub fn play(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::InvalidInput(format!(
                "nothing to play: {} does not exist, generate audio first",
                path.display()
            )));
        }

        self.stop();

        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| Error::DeviceUnavailable(format!("cannot open playback stream: {e}")))?;
        let sink = Sink::connect_new(stream.mixer());

        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let source = rodio::Decoder::new(BufReader::new(file)).map_err(|e| {
            Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;

        info!("Playing {}", path.display());
        sink.append(source);
        self.stream = Some(stream);
        self.sink = Some(sink);
        Ok(())
    }

    /// Halt and release the current instance. Idempotent.
    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.stream = None;
    }

    pub fn is_playing(&self) -> bool {
        self.sink.as_ref().map(|s| !s.empty()).unwrap_or(false)
    }

    /// Block until the current playback finishes.
    pub fn wait_until_done(&self) {
        if let Some(sink) = &self.sink {
            sink.sleep_until_end();
        } else {
            warn!("wait_until_done called with no active playback");
        }
    }
}

impl Default for FilePlayer {
    fn default() -> Self {
        Self::new()
    }
}
