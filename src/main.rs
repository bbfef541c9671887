//! speech-sound - say the number on screen
//!
//! Enter toggles listening, `q` then Enter quits. Diagnostics go to stderr
//! (`RUST_LOG`), the game view to stdout.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    queue,
    style::{Print, Stylize},
};
use speech_sound::audio::CaptureSource;
use speech_sound::game::{ButtonColor, TargetColor};
use speech_sound::{
    CaptureFactory, Config, Game, GameInput, RecognizerFactory, SessionController, SessionEvent,
    ViewModel,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/speech-sound.toml";

#[derive(Parser, Debug)]
#[command(name = "speech-sound", version, about = "Say the number on screen to score")]
struct Cli {
    /// Configuration file (defaults to config/speech-sound.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recognizer script, e.g. "4 42 42!" (selects the scripted recognizer)
    #[arg(long)]
    script: Option<String>,

    /// Replay this WAV file as the microphone
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Seed for the target numbers
    #[arg(long)]
    seed: Option<u64>,

    /// Silence that ends a listening session, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print session events as JSON lines
    #[arg(long)]
    json_events: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let capture = CaptureFactory::create(&cfg.capture).context("Failed to create audio capture")?;
    let recognizer =
        RecognizerFactory::create(&cfg.recognizer).context("Failed to create speech recognizer")?;

    let controller = SessionController::spawn(capture, recognizer, cfg.session.clone());

    let printer = cli
        .json_events
        .then(|| tokio::spawn(print_events(controller.subscribe())));

    let (input_tx, input_rx) = mpsc::channel(8);
    spawn_input_reader(input_tx)?;

    let summary = Game::new(controller, cfg.game.clone())
        .run(input_rx, render)
        .await?;

    if let Some(printer) = printer {
        let _ = printer.await;
    }

    println!("Final score: {}", summary.score);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .or_else(|| Path::new(DEFAULT_CONFIG).exists().then(|| PathBuf::from(DEFAULT_CONFIG)));

    let mut cfg = Config::load(path.as_deref())?;

    if let Some(script) = &cli.script {
        cfg.recognizer.backend = speech_sound::RecognizerBackend::Scripted;
        cfg.recognizer.script = script.clone();
    }
    if let Some(wav) = &cli.wav {
        cfg.capture.source = CaptureSource::Wav;
        cfg.capture.wav_path = Some(wav.to_string_lossy().into_owned());
    }
    if let Some(seed) = cli.seed {
        cfg.game.seed = Some(seed);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        cfg.session.inactivity_timeout_ms = timeout_ms;
    }

    Ok(cfg)
}

/// Stdin is read on a plain thread so a pending read never holds up runtime shutdown
fn spawn_input_reader(tx: mpsc::Sender<GameInput>) -> Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let input = match line.trim() {
                    "q" | "quit" => GameInput::Quit,
                    _ => GameInput::Toggle,
                };
                if tx.blocking_send(input).is_err() || input == GameInput::Quit {
                    return;
                }
            }
            let _ = tx.blocking_send(GameInput::Quit);
        })
        .context("Failed to spawn stdin reader")?;
    Ok(())
}

fn render(view: &ViewModel) -> Result<()> {
    let mut stdout = io::stdout().lock();

    let target = view.target.to_string().bold();
    let target = match view.target_color {
        TargetColor::Green => target.green(),
        TargetColor::Red => target.red(),
    };
    let button = match view.button_color {
        ButtonColor::Red => format!("[{}]", view.button_icon).red(),
        ButtonColor::Gray => format!("[{}]", view.button_icon).grey(),
    };

    queue!(
        stdout,
        Print(format!("{}  ", view.score_label)),
        Print(target),
        Print(format!("  {}  ", view.caption)),
        Print(button),
        Print("\n"),
    )?;
    stdout.flush()?;
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize event: {}", e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
