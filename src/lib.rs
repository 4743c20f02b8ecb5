//! Streaming text-to-speech playback pipeline.
//!
//! A synthesis engine emits successive chunks of mono f32 audio through a
//! per-chunk callback; the [`StreamingSynthesisController`] forwards each
//! chunk to a live [`AudioSink`] with blocking writes, supports cooperative
//! mid-stream cancellation, and persists the full waveform of each run via
//! [`GeneratedAudioStore`]. The [`AssetMaterializer`] stages packaged model
//! data onto the filesystem before the engine is constructed.

pub mod assets;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod player;
pub mod request;
pub mod sink;
pub mod store;

pub use assets::{AssetMaterializer, AssetStore, DirAssetStore};
pub use config::{EngineConfig, ModelPreset};
pub use controller::{RunOutcome, StreamingSynthesisController};
pub use engine::{AudioChunk, ChunkDecision, SynthesisEngine, SynthesisResult};
pub use error::{Error, Result};
pub use player::FilePlayer;
pub use request::SynthesisRequest;
pub use sink::{AudioSink, CpalSink};
pub use store::GeneratedAudioStore;
