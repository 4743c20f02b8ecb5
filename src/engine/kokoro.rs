use std::path::Path;

use kokorox::tts::koko::TTSKoko;
use log::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{AudioChunk, ChunkDecision, SynthesisEngine, SynthesisResult};
use crate::error::{Error, Result};

/// Kokoro emits 24 kHz mono audio regardless of model variant.
const KOKORO_SAMPLE_RATE: u32 = 24_000;

/// Voice styles shipped in the kokoro voice bank, indexed by speaker id.
const VOICE_STYLES: &[&str] = &[
    "af_bella", "af_nicole", "af_sarah", "af_sky", "am_adam", "am_michael", "bf_emma", "bf_isabella",
    "bm_george", "bm_lewis",
];

/// Kokoro-backed synthesis engine.
///
/// kokorox synthesizes a whole utterance per call, so streaming is done at
/// sentence granularity: the input is split at sentence boundaries and each
/// sentence becomes one chunk delivered to the callback as soon as it is
/// generated.
pub struct KokoroEngine {
    tts: TTSKoko,
}

impl KokoroEngine {
    /// Construct the engine from a configuration bundle. Failure here is
    /// fatal to the pipeline; no synthesis is possible without a model.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let model_path = config.model_path();
        let voices_path = config.voices_path().ok_or_else(|| {
            Error::EngineFailure("kokoro model requires a voice bank (voices)".into())
        })?;
        Self::from_paths(&model_path, &voices_path)
    }

    pub fn from_paths(model_path: &Path, voices_path: &Path) -> Result<Self> {
        info!("Loading kokoro model from: {}", model_path.display());
        info!("Using voice bank from: {}", voices_path.display());

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| Error::EngineFailure(format!("failed to start engine runtime: {e}")))?;
        let tts = runtime.block_on(TTSKoko::from_paths(
            model_path.to_string_lossy().as_ref(),
            voices_path.to_string_lossy().as_ref(),
        ));

        info!("Kokoro model loaded");
        Ok(Self { tts })
    }

    fn style_for_speaker(speaker_id: u32) -> &'static str {
        VOICE_STYLES[speaker_id as usize % VOICE_STYLES.len()]
    }
}

impl SynthesisEngine for KokoroEngine {
    fn sample_rate(&self) -> u32 {
        KOKORO_SAMPLE_RATE
    }

    fn generate(
        &self,
        text: &str,
        speaker_id: u32,
        speed: f32,
        on_chunk: &mut dyn FnMut(AudioChunk) -> ChunkDecision,
    ) -> Result<SynthesisResult> {
        let style = Self::style_for_speaker(speaker_id);
        let sentences = split_into_sentences(text);
        debug!(
            "Generating {} sentence chunk(s) with style {} at speed {}",
            sentences.len(),
            style,
            speed
        );

        let mut result = SynthesisResult::empty(KOKORO_SAMPLE_RATE);
        for (i, sentence) in sentences.iter().enumerate() {
            let samples = self
                .tts
                .tts_raw_audio(
                    sentence, "en",  // language
                    style, speed, None,  // initial_silence
                    true,  // auto_detect_language
                    false, // force_style
                    false, // input is text, not phonemes
                )
                .map_err(|e| Error::EngineFailure(format!("synthesis failed: {e:?}")))?;

            debug!(
                "Chunk {}/{}: {} samples ({:.2}s)",
                i + 1,
                sentences.len(),
                samples.len(),
                samples.len() as f32 / KOKORO_SAMPLE_RATE as f32
            );

            result.samples.extend_from_slice(&samples);
            if on_chunk(samples) == ChunkDecision::Halt {
                debug!("Halt requested after chunk {}", i + 1);
                break;
            }
        }

        Ok(result)
    }
}

/// Split text into sentences so playback can start before the whole utterance
/// is synthesized.
fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if ch == '.' || ch == '!' || ch == '?' || ch == ';' || ch == '\n' {
            let trimmed = current.trim();
            if trimmed.len() > 1 {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    // No punctuation at all: treat the whole text as one chunk.
    if sentences.is_empty() && !text.trim().is_empty() {
        sentences.push(text.trim().to_string());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_sentence_punctuation() {
        let s = split_into_sentences("One. Two! Three?");
        assert_eq!(s, vec!["One.", "Two!", "Three?"]);
    }

    #[test]
    fn unpunctuated_text_is_one_chunk() {
        let s = split_into_sentences("no punctuation here");
        assert_eq!(s, vec!["no punctuation here"]);
    }

    #[test]
    fn keeps_trailing_fragment() {
        let s = split_into_sentences("First sentence. trailing words");
        assert_eq!(s, vec!["First sentence.", "trailing words"]);
    }

    #[test]
    fn speaker_ids_wrap_around_the_voice_bank() {
        let n = VOICE_STYLES.len() as u32;
        assert_eq!(
            KokoroEngine::style_for_speaker(0),
            KokoroEngine::style_for_speaker(n)
        );
    }
}
