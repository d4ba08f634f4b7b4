use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use puck_detection::HsvRange;
use puck_prediction::PaddleCommand;
use puck_tracker::streaming::{run_dashboard_server, AppState, FrameHub, StatusHub};
use puck_tracker::{
    ChannelPaddleLink, Command, Config, ControlMessage, MachineChannels, SettingsStore,
    TrackerMachine,
};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Air hockey puck tracker and interception predictor")]
struct Args {
    /// Runtime configuration (TOML)
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Shared settings document (JSON); overrides `settings.path`
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Do not start the HTTP dashboard
    #[arg(long)]
    no_dashboard: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, load_error) = match Config::from_file(&args.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };
    if let Some(path) = args.settings {
        config.settings.path = path;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.system.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!("puck tracker waking up...");
    if let Some(e) = load_error {
        tracing::warn!("{}; using default configuration", e);
    }

    let (command_tx, command_rx) = bounded(config.machine.command_queue);
    let (paddle_tx, paddle_rx) = bounded(config.machine.command_queue);
    let frames = FrameHub::new();
    let status = StatusHub::new();

    spawn_paddle_logger(paddle_rx)?;
    if config.dashboard.enabled && !args.no_dashboard {
        let puck_range = SettingsStore::new(&config.settings.path)
            .load()
            .map(|s| HsvRange::from(s.puck.color))
            .unwrap_or(HsvRange::new([0, 0, 0], [179, 255, 255]));
        let state = AppState::new(frames.clone(), status.clone(), command_tx.clone(), puck_range);
        spawn_dashboard(state, config.dashboard.port)?;
    }
    // The dashboard keeps its own sender, so stdin EOF alone does not stop
    // the loop while it runs; `quit` from either source does.
    spawn_command_reader(command_tx)?;

    let camera = camera_source(&config)?;
    let mut machine = TrackerMachine::new(
        camera,
        &config,
        MachineChannels {
            commands: command_rx,
            paddle: Box::new(ChannelPaddleLink::new(paddle_tx)),
            frames,
            status,
        },
    );
    machine.run();
    Ok(())
}

#[cfg(feature = "camera")]
fn camera_source(config: &Config) -> anyhow::Result<puck_tracker::camera::NokhwaCamera> {
    Ok(puck_tracker::camera::NokhwaCamera::new(config.camera.device_id))
}

#[cfg(not(feature = "camera"))]
fn camera_source(_config: &Config) -> anyhow::Result<puck_tracker::MockCamera> {
    anyhow::bail!("built without camera support; rebuild with `--features camera`")
}

/// Supervisor commands, one per line.
fn spawn_command_reader(tx: Sender<ControlMessage>) -> io::Result<()> {
    thread::Builder::new()
        .name("commands".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(Command::from(line).into()).is_err() {
                    break;
                }
            }
            tracing::debug!("command input closed");
        })?;
    Ok(())
}

// Stands in for the paddle controller bus.
fn spawn_paddle_logger(rx: Receiver<PaddleCommand>) -> io::Result<()> {
    thread::Builder::new()
        .name("paddle".into())
        .spawn(move || {
            for command in rx {
                tracing::info!(x_mm = command.x_mm, y_mm = command.y_mm, "paddle set-point");
            }
        })?;
    Ok(())
}

fn spawn_dashboard(state: AppState, port: u16) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("dashboard".into())
        .spawn(move || {
            runtime.block_on(async move {
                if let Err(e) = run_dashboard_server(state, port).await {
                    tracing::error!("Serving error: {}", e)
                }
            })
        })?;
    Ok(())
}
