// soloplay - terminal front end
// Plays one file and maps stdin commands onto the transport

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soloplay::{
    PlaybackController, PlaybackState, PlayerEvent, PlayerSettings, Sound, SymphoniaEngine,
};

const HELP: &str = "commands: p play/pause, f/b skip, s <secs> seek, v <0..1> volume, x stop, q quit";

#[derive(Parser, Debug)]
#[command(name = "soloplay")]
#[command(about = "Play a single sound from the terminal")]
#[command(version)]
struct Args {
    /// Audio file to play
    file: PathBuf,

    /// Start volume (0.0 - 1.0), overrides the saved preference
    #[arg(short, long)]
    volume: Option<f32>,

    /// Directory holding player_settings.json
    #[arg(long, default_value = ".", env = "SOLOPLAY_SETTINGS_DIR")]
    settings_dir: PathBuf,
}

enum Flow {
    Continue,
    Quit,
}

fn handle_line(player: &PlaybackController, line: &str) -> Flow {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Flow::Continue;
    };
    let arg = parts.next();

    let result = match command {
        "p" => player.toggle_play_pause().map(|_| ()),
        "f" => player.skip_forward().map(|_| ()),
        "b" => player.skip_backward().map(|_| ()),
        "x" => player.stop().map(|_| ()),
        "s" => match arg.and_then(|a| a.parse::<f64>().ok()) {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                player.seek(Duration::from_secs_f64(secs)).map(|_| ())
            }
            _ => {
                println!("usage: s <seconds>");
                Ok(())
            }
        },
        "v" => match arg.and_then(|a| a.parse::<f32>().ok()) {
            Some(value) => {
                let volume = player.set_volume(value);
                println!("volume {:.2}", volume.get());
                Ok(())
            }
            None => {
                println!("usage: v <0..1>");
                Ok(())
            }
        },
        "q" => return Flow::Quit,
        _ => {
            println!("{}", HELP);
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("{}", e);
    }
    Flow::Continue
}

fn print_progress(player: &PlaybackController) {
    let snapshot = player.snapshot();
    let position = snapshot.position;
    print!(
        "\r[{}] {:>6.1}s / {:>6.1}s   ",
        snapshot.state,
        position.current().as_secs_f64(),
        position.total().as_secs_f64()
    );
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soloplay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut settings = PlayerSettings::load(&args.settings_dir)?;
    if let Some(volume) = args.volume {
        settings.volume = volume;
    }
    let mut settings = settings.sanitized();

    let engine = SymphoniaEngine::new().context("Failed to start audio engine")?;
    let player = PlaybackController::new(engine, &settings)?;

    let sound = Sound::from_path(&args.file);
    info!("Playing {}", args.file.display());
    player
        .load(sound)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    player.play()?;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut snapshots = player.subscribe();
    let mut events = player.events();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if let Flow::Quit = handle_line(&player, &line) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                print_progress(&player);
            }
            event = events.recv() => {
                match event {
                    Ok(PlayerEvent::StateChanged { new: PlaybackState::Ended, .. }) => {
                        println!();
                        info!("Reached the end, press p to play again or q to quit");
                    }
                    Ok(PlayerEvent::EngineFault { reason }) => {
                        println!();
                        tracing::warn!("Output problem: {}", reason);
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("Skipped {} events", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = signal::ctrl_c() => {
                println!();
                info!("Interrupted");
                break;
            }
        }
    }

    settings.volume = player.volume().get();
    player.dispose();

    if let Err(e) = settings.save(&args.settings_dir) {
        tracing::warn!("Could not save settings: {:#}", e);
    }
    Ok(())
}
