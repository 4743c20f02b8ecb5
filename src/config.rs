use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetMaterializer, AssetStore};

/// Model bundle the synthesis engine is constructed from.
///
/// Mirrors the on-disk layout of packaged TTS releases: a model directory
/// holding the network weights, plus optional voice bank, lexicons, and an
/// espeak-ng style data directory that must be materialized to a writable
/// location before the engine can read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory inside the asset store holding this model's files.
    pub model_dir: PathBuf,
    /// Network weights file name within `model_dir`.
    pub model_name: String,
    /// Acoustic model file, for two-stage (acoustic + vocoder) families.
    #[serde(default)]
    pub acoustic_model_name: Option<String>,
    /// Vocoder file, resolved against the asset-store root.
    #[serde(default)]
    pub vocoder: Option<String>,
    /// Voice bank file within `model_dir`.
    #[serde(default)]
    pub voices: Option<String>,
    /// Lexicon files within `model_dir`.
    #[serde(default)]
    pub lexicon: Vec<String>,
    /// Data directory (relative to the asset store) that must be
    /// materialized to the filesystem before engine construction.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub dict_dir: Option<PathBuf>,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid engine config", path.display()))
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_name)
    }

    pub fn voices_path(&self) -> Option<PathBuf> {
        self.voices.as_ref().map(|v| self.model_dir.join(v))
    }

    pub fn lexicon_paths(&self) -> Vec<PathBuf> {
        self.lexicon.iter().map(|l| self.model_dir.join(l)).collect()
    }

    /// Resolve every stored path against `root` (the materialized asset
    /// root), returning a config usable from the real filesystem.
    pub fn rooted_at(&self, root: &Path) -> Self {
        let mut rooted = self.clone();
        rooted.model_dir = root.join(&self.model_dir);
        rooted.data_dir = self.data_dir.as_ref().map(|d| root.join(d));
        rooted.dict_dir = self.dict_dir.as_ref().map(|d| root.join(d));
        rooted
    }

    /// Stage the directories the engine reads from the real filesystem
    /// (`data_dir`, `dict_dir`) out of `store` and repoint them at the
    /// materialized copies; model files keep resolving against `asset_root`.
    pub fn staged(
        &self,
        asset_root: &Path,
        store: &dyn AssetStore,
        materializer: &AssetMaterializer,
    ) -> crate::error::Result<Self> {
        let mut rooted = self.rooted_at(asset_root);
        if let Some(data_dir) = &self.data_dir {
            let dest = materializer.materialize(store, data_dir)?;
            rooted.data_dir = Some(dest.join(data_dir));
        }
        if let Some(dict_dir) = &self.dict_dir {
            let dest = materializer.materialize(store, dict_dir)?;
            rooted.dict_dir = Some(dest.join(dict_dir));
        }
        Ok(rooted)
    }
}

/// Known packaged model bundles, selectable by name.
///
/// These are configuration data, not pipeline logic; adding a release means
/// adding a variant here, nothing in the pipeline changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelPreset {
    VitsVctk,
    VitsPiperEnUsAmyLow,
    MatchaIcefallEnUsLjspeech,
    KokoroMultiLang,
    KittenNanoEn,
}

impl ModelPreset {
    pub const ALL: &'static [ModelPreset] = &[
        ModelPreset::VitsVctk,
        ModelPreset::VitsPiperEnUsAmyLow,
        ModelPreset::MatchaIcefallEnUsLjspeech,
        ModelPreset::KokoroMultiLang,
        ModelPreset::KittenNanoEn,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelPreset::VitsVctk => "vits-vctk",
            ModelPreset::VitsPiperEnUsAmyLow => "vits-piper-en_US-amy-low",
            ModelPreset::MatchaIcefallEnUsLjspeech => "matcha-icefall-en_US-ljspeech",
            ModelPreset::KokoroMultiLang => "kokoro-int8-multi-lang",
            ModelPreset::KittenNanoEn => "kitten-nano-en",
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn config(&self) -> EngineConfig {
        match self {
            ModelPreset::VitsVctk => EngineConfig {
                model_dir: "vits-vctk".into(),
                model_name: "vits-vctk.onnx".into(),
                acoustic_model_name: None,
                vocoder: None,
                voices: None,
                lexicon: vec!["lexicon.txt".into()],
                data_dir: None,
                dict_dir: None,
            },
            ModelPreset::VitsPiperEnUsAmyLow => EngineConfig {
                model_dir: "vits-piper-en_US-amy-low".into(),
                model_name: "en_US-amy-low.onnx".into(),
                acoustic_model_name: None,
                vocoder: None,
                voices: None,
                lexicon: Vec::new(),
                data_dir: Some("vits-piper-en_US-amy-low/espeak-ng-data".into()),
                dict_dir: None,
            },
            ModelPreset::MatchaIcefallEnUsLjspeech => EngineConfig {
                model_dir: "matcha-icefall-en_US-ljspeech".into(),
                model_name: String::new(),
                acoustic_model_name: Some("model-steps-3.onnx".into()),
                vocoder: Some("vocos-22khz-univ.onnx".into()),
                voices: None,
                lexicon: Vec::new(),
                data_dir: Some("matcha-icefall-en_US-ljspeech/espeak-ng-data".into()),
                dict_dir: None,
            },
            ModelPreset::KokoroMultiLang => EngineConfig {
                model_dir: "kokoro-int8-multi-lang-v1_1".into(),
                model_name: "model.int8.onnx".into(),
                acoustic_model_name: None,
                vocoder: None,
                voices: Some("voices.bin".into()),
                lexicon: vec!["lexicon-us-en.txt".into(), "lexicon-zh.txt".into()],
                data_dir: Some("kokoro-int8-multi-lang-v1_1/espeak-ng-data".into()),
                dict_dir: None,
            },
            ModelPreset::KittenNanoEn => EngineConfig {
                model_dir: "kitten-nano-en-v0_1-fp16".into(),
                model_name: "model.fp16.onnx".into(),
                acoustic_model_name: None,
                vocoder: None,
                voices: Some("voices.bin".into()),
                lexicon: Vec::new(),
                data_dir: Some("kitten-nano-en-v0_1-fp16/espeak-ng-data".into()),
                dict_dir: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_names_round_trip() {
        for preset in ModelPreset::ALL {
            assert_eq!(ModelPreset::by_name(preset.name()), Some(*preset));
        }
        assert_eq!(ModelPreset::by_name("no-such-model"), None);
    }

    #[test]
    fn config_serializes_to_json_and_back() {
        let config = ModelPreset::KokoroMultiLang.config();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn rooted_config_resolves_model_path() {
        let config = ModelPreset::KokoroMultiLang.config();
        let rooted = config.rooted_at(Path::new("/data/assets"));
        assert_eq!(
            rooted.model_path(),
            Path::new("/data/assets/kokoro-int8-multi-lang-v1_1/model.int8.onnx")
        );
        assert!(rooted
            .data_dir
            .as_ref()
            .unwrap()
            .starts_with("/data/assets"));
    }

    #[test]
    fn staging_repoints_data_dir_at_the_writable_copy() {
        use crate::assets::DirAssetStore;

        let assets = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let src = assets
            .path()
            .join("kokoro-int8-multi-lang-v1_1/espeak-ng-data");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("en_dict"), b"dict").unwrap();

        let config = ModelPreset::KokoroMultiLang.config();
        let store = DirAssetStore::new(assets.path());
        let materializer = AssetMaterializer::new(data.path());
        let staged = config
            .staged(assets.path(), &store, &materializer)
            .unwrap();

        // The engine reads espeak-ng data from the writable copy.
        let staged_dir = staged.data_dir.clone().unwrap();
        assert!(staged_dir.starts_with(data.path()));
        assert!(staged_dir.join("en_dict").is_file());

        // Model files still resolve against the read-only store.
        assert!(staged.model_path().starts_with(assets.path()));
    }

    #[test]
    fn from_file_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, "not json").unwrap();
        assert!(EngineConfig::from_file(&path).is_err());
    }
}
