use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, info};

use crate::engine::{ChunkDecision, SynthesisEngine};
use crate::error::{Error, Result};
use crate::request::SynthesisRequest;
use crate::sink::AudioSink;
use crate::store::GeneratedAudioStore;

/// Terminal status of one synthesis run, delivered to the completion
/// callback on the worker thread.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Natural end of text; the waveform was persisted.
    Completed { path: PathBuf, samples: usize },
    /// Halted by `request_stop` before natural completion. Audio produced up
    /// to the halt is persisted when non-empty.
    Cancelled { path: Option<PathBuf> },
    /// Engine error, empty result, or persistence failure.
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Generating,
}

pub type CompletionCallback = Box<dyn FnMut(RunOutcome) + Send>;

/// Orchestrates one end-to-end synthesis run and its cancellation.
///
/// State machine: `Idle -> Generating -> {Completed, Cancelled, Failed} ->
/// Idle`. Exactly one worker thread exists per run; the state machine, not a
/// lock around the sink, is what guarantees the sink is never written by two
/// runs at once.
pub struct StreamingSynthesisController {
    engine: Arc<dyn SynthesisEngine>,
    sink: Arc<dyn AudioSink>,
    store: GeneratedAudioStore,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<RunState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    on_complete: Arc<Mutex<CompletionCallback>>,
}

impl StreamingSynthesisController {
    pub fn new(
        engine: Arc<dyn SynthesisEngine>,
        sink: Arc<dyn AudioSink>,
        store: GeneratedAudioStore,
        on_complete: CompletionCallback,
    ) -> Self {
        Self {
            engine,
            sink,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(RunState::Idle)),
            worker: Mutex::new(None),
            on_complete: Arc::new(Mutex::new(on_complete)),
        }
    }

    /// Begin a synthesis run. Valid only from `Idle`; a run already in
    /// progress is left untouched and `AlreadyRunning` is returned. Blocks
    /// until the previous run's worker thread has fully exited, so two
    /// workers never coexist and completion callbacks never interleave.
    pub fn start(&self, request: &SynthesisRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state == RunState::Generating {
            return Err(Error::AlreadyRunning);
        }

        // The previous worker must have fully exited before a new run begins,
        // or its completion callback could interleave with the new run's. A
        // restart issued from inside that callback executes on the worker's
        // own thread, where joining would be a self-join; there the handle is
        // detached instead, and the only thing left on it after the callback
        // returns is thread exit.
        if let Some(handle) = self.worker.lock().unwrap().take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }

        self.cancel.store(false, Ordering::SeqCst);
        self.sink.reset_for_new_stream()?;
        *state = RunState::Generating;

        info!(
            "Starting synthesis: {} chars, speaker {}, speed {}",
            request.text().len(),
            request.speaker_id(),
            request.speed()
        );

        let engine = self.engine.clone();
        let sink = self.sink.clone();
        let store = self.store.clone();
        let cancel = self.cancel.clone();
        let run_state = self.state.clone();
        let on_complete = self.on_complete.clone();
        let text = request.text().to_string();
        let speaker_id = request.speaker_id();
        let speed = request.speed();

        let handle = std::thread::spawn(move || {
            let outcome = run_synthesis(&*engine, &*sink, &store, &cancel, &text, speaker_id, speed);

            // Back to Idle before notifying, so the callback may start the
            // next run immediately. Any other thread restarting concurrently
            // still waits: start joins this worker before proceeding.
            *run_state.lock().unwrap() = RunState::Idle;
            (on_complete.lock().unwrap())(outcome);
        });
        *self.worker.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Request cancellation of the in-flight run. Callable from any thread in
    /// any state; when `Idle` this has no observable effect. The flag takes
    /// effect at the next callback boundary; the sink is stopped out-of-band
    /// here so audible output halts promptly even between chunks.
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.sink.stop();
        debug!("Stop requested");
    }

    pub fn is_generating(&self) -> bool {
        *self.state.lock().unwrap() == RunState::Generating
    }
}

/// One run on the worker thread. Converts every failure into a `RunOutcome`;
/// nothing crosses the thread boundary unhandled.
fn run_synthesis(
    engine: &dyn SynthesisEngine,
    sink: &dyn AudioSink,
    store: &GeneratedAudioStore,
    cancel: &AtomicBool,
    text: &str,
    speaker_id: u32,
    speed: f32,
) -> RunOutcome {
    let mut halted = false;
    let mut write_error: Option<Error> = None;

    let mut on_chunk = |chunk: Vec<f32>| -> ChunkDecision {
        // The flag value observed here deterministically decides this
        // invocation; no chunk is written once it has been seen true.
        if cancel.load(Ordering::SeqCst) {
            halted = true;
            sink.stop();
            return ChunkDecision::Halt;
        }
        match sink.write_blocking(&chunk) {
            Ok(_) => ChunkDecision::Continue,
            Err(e) => {
                error!("Sink write failed: {e}");
                write_error = Some(e);
                ChunkDecision::Halt
            }
        }
    };

    let result = engine.generate(text, speaker_id, speed, &mut on_chunk);

    match result {
        Err(e) => {
            error!("Synthesis failed: {e}");
            RunOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Ok(_) if write_error.is_some() => RunOutcome::Failed {
            reason: write_error.unwrap().to_string(),
        },
        Ok(result) => {
            let saved = if result.is_empty() {
                false
            } else {
                store.save(&result)
            };

            if halted {
                info!(
                    "Synthesis cancelled after {} samples",
                    result.samples.len()
                );
                RunOutcome::Cancelled {
                    path: saved.then(|| store.path().to_path_buf()),
                }
            } else if result.is_empty() {
                RunOutcome::Failed {
                    reason: "engine produced no audio".into(),
                }
            } else if saved {
                info!("Synthesis completed: {} samples", result.samples.len());
                RunOutcome::Completed {
                    path: store.path().to_path_buf(),
                    samples: result.samples.len(),
                }
            } else {
                RunOutcome::Failed {
                    reason: "failed to persist generated audio".into(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AudioChunk, SynthesisResult};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Engine producing fixed chunks, one callback invocation each.
    struct ScriptedEngine {
        chunks: Vec<AudioChunk>,
    }

    impl SynthesisEngine for ScriptedEngine {
        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn generate(
            &self,
            _text: &str,
            _speaker_id: u32,
            _speed: f32,
            on_chunk: &mut dyn FnMut(AudioChunk) -> ChunkDecision,
        ) -> crate::error::Result<SynthesisResult> {
            let mut result = SynthesisResult::empty(self.sample_rate());
            for chunk in &self.chunks {
                result.samples.extend_from_slice(chunk);
                if on_chunk(chunk.clone()) == ChunkDecision::Halt {
                    break;
                }
            }
            Ok(result)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<Vec<f32>>>,
        resets: AtomicUsize,
        stops: AtomicUsize,
    }

    impl AudioSink for RecordingSink {
        fn reset_for_new_stream(&self) -> crate::error::Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn write_blocking(&self, chunk: &[f32]) -> crate::error::Result<usize> {
            self.writes.lock().unwrap().push(chunk.to_vec());
            Ok(chunk.len())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn controller_with(
        chunks: Vec<AudioChunk>,
        dir: &std::path::Path,
    ) -> (
        StreamingSynthesisController,
        Arc<RecordingSink>,
        mpsc::Receiver<RunOutcome>,
    ) {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::channel();
        let controller = StreamingSynthesisController::new(
            Arc::new(ScriptedEngine { chunks }),
            sink.clone(),
            GeneratedAudioStore::new(dir),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        (controller, sink, rx)
    }

    #[test]
    fn completed_run_resets_sink_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, sink, rx) =
            controller_with(vec![vec![0.1; 8], vec![0.2; 8]], dir.path());

        let request = SynthesisRequest::new("hello", 0, 1.0).unwrap();
        controller.start(&request).unwrap();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(matches!(outcome, RunOutcome::Completed { samples: 16, .. }));
        assert_eq!(sink.resets.load(Ordering::SeqCst), 1);
        assert_eq!(sink.writes.lock().unwrap().len(), 2);
        assert!(!controller.is_generating());
    }

    #[test]
    fn empty_result_fails_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _sink, rx) = controller_with(Vec::new(), dir.path());

        let request = SynthesisRequest::new("hello", 0, 1.0).unwrap();
        controller.start(&request).unwrap();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(matches!(outcome, RunOutcome::Failed { .. }));
        assert!(!GeneratedAudioStore::new(dir.path()).exists());
    }

    #[test]
    fn request_stop_when_idle_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _sink, rx) = controller_with(vec![vec![0.3; 4]], dir.path());

        controller.request_stop();
        assert!(!controller.is_generating());

        // The controller is still usable for a fresh run.
        let request = SynthesisRequest::new("again", 0, 1.0).unwrap();
        controller.start(&request).unwrap();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
    }

    #[test]
    fn restart_is_possible_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, _sink, rx) = controller_with(Vec::new(), dir.path());

        let request = SynthesisRequest::new("hello", 0, 1.0).unwrap();
        controller.start(&request).unwrap();
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            RunOutcome::Failed { .. }
        ));

        // Back to Idle unconditionally: a retry must be accepted.
        controller.start(&request).unwrap();
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            RunOutcome::Failed { .. }
        ));
    }
}
