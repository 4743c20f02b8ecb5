use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::engine::SynthesisResult;
use crate::error::{Error, Result};

/// Filename of the single "most recent generation" slot.
pub const GENERATED_FILE_NAME: &str = "generated.wav";

/// Persists the fully-synthesized waveform of the most recent run to one
/// canonical WAV file. Each save overwrites the previous file; this is a
/// slot, not an archive.
#[derive(Debug, Clone)]
pub struct GeneratedAudioStore {
    path: PathBuf,
}

impl GeneratedAudioStore {
    /// Store whose canonical file lives under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(GENERATED_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the waveform as single-channel 32-bit float PCM. Returns `false`
    /// (not an error) when the result is empty or the write fails; an empty
    /// result leaves any prior file untouched.
    pub fn save(&self, result: &SynthesisResult) -> bool {
        if result.is_empty() {
            warn!("Not persisting an empty synthesis result");
            return false;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: result.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let write = || -> std::result::Result<(), hound::Error> {
            let mut writer = hound::WavWriter::create(&self.path, spec)?;
            for &sample in &result.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()
        };

        match write() {
            Ok(()) => {
                info!(
                    "Persisted {} samples ({:.2}s) to {}",
                    result.samples.len(),
                    result.duration_secs(),
                    self.path.display()
                );
                true
            }
            Err(e) => {
                error!("Failed to persist {}: {e}", self.path.display());
                false
            }
        }
    }

    /// Read the canonical file back as samples plus sample rate.
    pub fn load(&self) -> Result<SynthesisResult> {
        let mut reader = hound::WavReader::open(&self.path).map_err(|e| match e {
            hound::Error::IoError(io) => Error::io(&self.path, io),
            other => Error::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, other),
            ),
        })?;

        let spec = reader.spec();
        let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect(),
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect()
            }
        };
        let samples = samples.map_err(|e| {
            Error::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;

        Ok(SynthesisResult {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(samples: Vec<f32>) -> SynthesisResult {
        SynthesisResult {
            samples,
            sample_rate: 24_000,
        }
    }

    #[test]
    fn round_trips_samples_and_rate() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedAudioStore::new(dir.path());
        let result = result_with(vec![0.0, 0.5, -0.5, 1.0, -1.0]);

        assert!(store.save(&result));
        let loaded = store.load().unwrap();
        assert_eq!(loaded.samples.len(), result.samples.len());
        assert_eq!(loaded.sample_rate, result.sample_rate);
        assert_eq!(loaded.samples, result.samples);
    }

    #[test]
    fn empty_result_is_rejected_and_prior_file_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedAudioStore::new(dir.path());

        assert!(store.save(&result_with(vec![0.25; 10])));
        assert!(!store.save(&result_with(Vec::new())));

        // The earlier generation is still there.
        let loaded = store.load().unwrap();
        assert_eq!(loaded.samples.len(), 10);
    }

    #[test]
    fn each_save_overwrites_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedAudioStore::new(dir.path());

        assert!(store.save(&result_with(vec![0.1; 100])));
        assert!(store.save(&result_with(vec![0.2; 7])));
        let loaded = store.load().unwrap();
        assert_eq!(loaded.samples.len(), 7);
    }

    #[test]
    fn save_failure_returns_false() {
        let store = GeneratedAudioStore::new("/nonexistent-dir/nested");
        assert!(!store.save(&result_with(vec![0.1; 4])));
    }
}
