#[cfg(feature = "kokoro")]
pub mod kokoro;

use crate::error::Result;

/// One increment of generated mono audio, owned by the receiver once the
/// engine hands it over.
pub type AudioChunk = Vec<f32>;

/// What the per-chunk callback tells the engine to do next. This return value
/// is the only cancellation channel into the engine; there is no separate
/// cancel API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDecision {
    /// Keep producing chunks.
    Continue,
    /// Stop generating further chunks and finalize immediately.
    Halt,
}

/// The concatenation of every chunk produced during one synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesisResult {
    pub fn empty(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// A text-to-speech engine that emits audio incrementally.
///
/// `generate` invokes `on_chunk` synchronously on the calling thread, once per
/// chunk, in generation order, and must respect a `Halt` decision by stopping
/// before the next chunk. The returned result holds every chunk actually
/// produced, including one that was produced but answered with `Halt`.
pub trait SynthesisEngine: Send + Sync {
    /// Fixed output sample rate, known at construction.
    fn sample_rate(&self) -> u32;

    fn generate(
        &self,
        text: &str,
        speaker_id: u32,
        speed: f32,
        on_chunk: &mut dyn FnMut(AudioChunk) -> ChunkDecision,
    ) -> Result<SynthesisResult>;
}
