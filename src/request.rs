use crate::error::{Error, Result};

/// A validated synthesis request.
///
/// Constructed once, immutable afterwards. Construction is the validation
/// gate: a request that violates any field constraint never reaches the
/// pipeline, the engine, or the audio sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    speaker_id: u32,
    speed: f32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, speaker_id: u32, speed: f32) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("text must not be empty".into()));
        }
        if !(speed > 0.0) || !speed.is_finite() {
            return Err(Error::InvalidInput(format!(
                "speed must be a positive number, got {speed}"
            )));
        }
        Ok(Self {
            text,
            speaker_id,
            speed,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn speaker_id(&self) -> u32 {
        self.speaker_id
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}
