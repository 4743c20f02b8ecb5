use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;

use recite::{FilePlayer, GeneratedAudioStore, SynthesisRequest};

/// Offline text-to-speech with streaming playback and mid-stream stop.
#[derive(Parser, Debug)]
#[command(name = "recite", version, about)]
struct Cli {
    /// Text to synthesize and play.
    text: Option<String>,

    /// Speaker id within the model's voice bank.
    #[arg(long, default_value_t = 0)]
    speaker: u32,

    /// Speech speed multiplier; must be positive.
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Play the most recently generated file instead of synthesizing.
    #[arg(long)]
    play_last: bool,

    /// Root of the packaged (read-only) asset store.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Writable directory for materialized data and generated audio.
    #[arg(long, default_value = "data")]
    data: PathBuf,

    /// Engine config JSON file; overrides --preset.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Named model preset.
    #[arg(long, default_value = "kokoro-int8-multi-lang")]
    preset: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let store = GeneratedAudioStore::new(&cli.data);

    if cli.play_last {
        let mut player = FilePlayer::new();
        player.play(store.path())?;
        player.wait_until_done();
        return Ok(());
    }

    let text = cli
        .text
        .clone()
        .context("TEXT is required unless --play-last is given")?;
    let request = SynthesisRequest::new(text, cli.speaker, cli.speed)?;

    synthesize(&cli, &request, store)
}

#[cfg(feature = "kokoro")]
fn synthesize(cli: &Cli, request: &SynthesisRequest, store: GeneratedAudioStore) -> anyhow::Result<()> {
    use std::sync::{mpsc, Arc};

    use recite::engine::kokoro::KokoroEngine;
    use recite::{
        AssetMaterializer, CpalSink, DirAssetStore, EngineConfig, ModelPreset, RunOutcome,
        StreamingSynthesisController,
    };

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => ModelPreset::by_name(&cli.preset)
            .with_context(|| format!("unknown preset '{}'", cli.preset))?
            .config(),
    };

    std::fs::create_dir_all(&cli.data)?;

    // Stage espeak-ng data (and dictionaries) to the writable root and point
    // the config at the copies; model weights stay on the asset store.
    let asset_store = DirAssetStore::new(&cli.assets);
    let materializer = AssetMaterializer::new(&cli.data);
    let rooted = config.staged(&cli.assets, &asset_store, &materializer)?;

    let engine = Arc::new(KokoroEngine::from_config(&rooted)?);
    let sink = Arc::new(CpalSink::open(engine.sample_rate())?);

    let (outcome_tx, outcome_rx) = mpsc::channel();
    let controller = Arc::new(StreamingSynthesisController::new(
        engine,
        sink,
        store,
        Box::new(move |outcome| {
            let _ = outcome_tx.send(outcome);
        }),
    ));

    controller.start(request)?;
    eprintln!("Generating... press Enter to stop.");

    // Stop on Enter; the thread dies with the process once the run ends.
    let stopper = controller.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            stopper.request_stop();
        }
    });

    match outcome_rx.recv()? {
        RunOutcome::Completed { path, samples } => {
            eprintln!("Generated {samples} samples: {}", path.display());
            Ok(())
        }
        RunOutcome::Cancelled { path } => {
            match path {
                Some(path) => eprintln!("Stopped; partial audio kept at {}", path.display()),
                None => eprintln!("Stopped before any audio was generated"),
            }
            Ok(())
        }
        RunOutcome::Failed { reason } => anyhow::bail!("generation failed: {reason}"),
    }
}

#[cfg(not(feature = "kokoro"))]
fn synthesize(
    _cli: &Cli,
    _request: &SynthesisRequest,
    _store: GeneratedAudioStore,
) -> anyhow::Result<()> {
    anyhow::bail!("this build has no synthesis engine; rebuild with --features kokoro")
}
