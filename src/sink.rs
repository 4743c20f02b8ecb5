use std::collections::VecDeque;
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info, warn};

use crate::error::{Error, Result};

/// Target device buffer length in frames; clamped to the platform-reported
/// range so we never go below the minimum the device supports.
const DESIRED_BUFFER_FRAMES: u32 = 1024;

/// A live device audio output accepting blocking writes of mono f32 samples.
///
/// Implementations must allow `write_blocking` on a worker thread while
/// `reset_for_new_stream` and `stop` are issued from another thread.
pub trait AudioSink: Send + Sync {
    /// Pause output, discard any buffered-but-unplayed audio, and resume.
    /// Called immediately before a new synthesis run so stale audio from a
    /// prior (possibly interrupted) run is never heard.
    fn reset_for_new_stream(&self) -> Result<()>;

    /// Block until the device queue has accepted the whole chunk. The return
    /// value is the number of samples accepted; it is short only when the
    /// sink was stopped mid-write.
    fn write_blocking(&self, chunk: &[f32]) -> Result<usize>;

    /// Halt playback. Idempotent, safe when already stopped, and swallows
    /// device errors: teardown failures are not actionable by the caller.
    fn stop(&self);
}

struct QueueState {
    queue: VecDeque<f32>,
    capacity: usize,
    stopped: bool,
}

/// Bounded sample queue between the producing worker and the device callback.
///
/// The producer blocks while the queue is at capacity, which throttles
/// generation to roughly real-time pace. The device callback drains it and
/// wakes the producer.
struct SampleQueue {
    state: Mutex<QueueState>,
    space: Condvar,
}

impl SampleQueue {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::with_capacity(capacity),
                capacity,
                stopped: false,
            }),
            space: Condvar::new(),
        }
    }

    /// Push every sample, waiting for space as needed. Returns the number of
    /// samples accepted; short only if the queue was stopped mid-push.
    fn push_blocking(&self, samples: &[f32]) -> usize {
        let mut written = 0;
        let mut st = self.state.lock().unwrap();
        while written < samples.len() {
            if st.stopped {
                break;
            }
            if st.queue.len() >= st.capacity {
                // Timed wait so a stop that raced the notify is still seen.
                st = self
                    .space
                    .wait_timeout(st, Duration::from_millis(50))
                    .unwrap()
                    .0;
                continue;
            }
            let room = st.capacity - st.queue.len();
            let take = room.min(samples.len() - written);
            st.queue
                .extend(samples[written..written + take].iter().copied());
            written += take;
        }
        written
    }

    /// Fill an interleaved output buffer, duplicating the mono sample across
    /// channels and zero-filling on underrun or while stopped.
    fn pop_interleaved(&self, out: &mut [f32], channels: usize) {
        {
            let mut st = self.state.lock().unwrap();
            for frame in out.chunks_mut(channels) {
                let sample = if st.stopped {
                    0.0
                } else {
                    st.queue.pop_front().unwrap_or(0.0)
                };
                frame.fill(sample);
            }
        }
        self.space.notify_all();
    }

    /// Discard buffered-but-unplayed samples.
    fn flush(&self) {
        self.state.lock().unwrap().queue.clear();
        self.space.notify_all();
    }

    fn set_stopped(&self, stopped: bool) {
        self.state.lock().unwrap().stopped = stopped;
        self.space.notify_all();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }
}

enum StreamCmd {
    Pause,
    Resume,
    Shutdown,
}

/// cpal-backed [`AudioSink`] on the default output device.
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread that owns
/// it for its whole lifetime and takes pause/resume commands over a channel;
/// sample data flows through the shared [`SampleQueue`].
pub struct CpalSink {
    queue: Arc<SampleQueue>,
    cmd_tx: mpsc::Sender<StreamCmd>,
    worker: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl CpalSink {
    /// Open the default output device for mono f32 playback at the given
    /// rate. The sink starts in a playing state.
    pub fn open(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no output device found".into()))?;

        let supported = Self::pick_output_config(&device, sample_rate)?;
        let channels = supported.channels() as usize;
        let buffer_size = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => {
                cpal::BufferSize::Fixed(DESIRED_BUFFER_FRAMES.clamp(*min, *max))
            }
            cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
        };
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size,
        };

        info!(
            "Opening output device {:?}: {} Hz, {} channel(s), buffer {:?}",
            device.name(),
            sample_rate,
            channels,
            config.buffer_size
        );

        // Enough for ~250ms of audio: deep enough to ride out generation
        // hiccups, shallow enough that a flush halts output promptly.
        let capacity = (sample_rate as usize / 4).max(DESIRED_BUFFER_FRAMES as usize * 4);
        let queue = Arc::new(SampleQueue::new(capacity));

        let (cmd_tx, cmd_rx) = mpsc::channel::<StreamCmd>();
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();

        let thread_queue = queue.clone();
        let worker = std::thread::spawn(move || {
            let cb_queue = thread_queue;
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    cb_queue.pop_interleaved(data, channels);
                },
                |err| error!("Output stream error: {err}"),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to build output stream: {e}")));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start output stream: {e}")));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive while serving pause/resume commands.
            loop {
                match cmd_rx.recv() {
                    Ok(StreamCmd::Pause) => {
                        if let Err(e) = stream.pause() {
                            warn!("Failed to pause output stream: {e}");
                        }
                    }
                    Ok(StreamCmd::Resume) => {
                        if let Err(e) = stream.play() {
                            warn!("Failed to resume output stream: {e}");
                        }
                    }
                    Ok(StreamCmd::Shutdown) | Err(_) => break,
                }
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                queue,
                cmd_tx,
                worker: Some(worker),
                sample_rate,
            }),
            Ok(Err(msg)) => Err(Error::DeviceUnavailable(msg)),
            Err(_) => Err(Error::DeviceUnavailable(
                "audio stream thread exited during startup".into(),
            )),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pick_output_config(
        device: &cpal::Device,
        sample_rate: u32,
    ) -> Result<cpal::SupportedStreamConfig> {
        let configs = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceUnavailable(format!("cannot query output configs: {e}")))?;

        // f32 output at the engine rate, preferring the fewest channels since
        // the content is mono speech.
        let mut best: Option<cpal::SupportedStreamConfigRange> = None;
        for range in configs {
            if range.sample_format() != cpal::SampleFormat::F32 {
                continue;
            }
            if range.min_sample_rate().0 > sample_rate || range.max_sample_rate().0 < sample_rate {
                continue;
            }
            match &best {
                None => best = Some(range),
                Some(current) => {
                    if range.channels() < current.channels() {
                        best = Some(range);
                    }
                }
            }
        }

        best.map(|range| range.with_sample_rate(cpal::SampleRate(sample_rate)))
            .ok_or_else(|| {
                Error::DeviceUnavailable(format!(
                    "no f32 output config supports {sample_rate} Hz"
                ))
            })
    }
}

impl AudioSink for CpalSink {
    fn reset_for_new_stream(&self) -> Result<()> {
        let _ = self.cmd_tx.send(StreamCmd::Pause);
        self.queue.flush();
        self.queue.set_stopped(false);
        self.cmd_tx
            .send(StreamCmd::Resume)
            .map_err(|_| Error::DeviceUnavailable("audio stream thread exited".into()))?;
        Ok(())
    }

    fn write_blocking(&self, chunk: &[f32]) -> Result<usize> {
        Ok(self.queue.push_blocking(chunk))
    }

    fn stop(&self) {
        self.queue.set_stopped(true);
        self.queue.flush();
        let _ = self.cmd_tx.send(StreamCmd::Pause);
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop();
        let _ = self.cmd_tx.send(StreamCmd::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
