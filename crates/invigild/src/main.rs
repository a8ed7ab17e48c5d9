use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod emotion;
mod engine;
mod replay;
mod source;

use config::Config;
use dbus_interface::{InvigilService, BUS_NAME, OBJECT_PATH};
use replay::ReplayLog;

#[derive(Parser)]
#[command(name = "invigild", about = "Exam-proctoring suspicion monitor", version)]
struct Args {
    /// Directory of frames to process (overrides INVIGIL_FRAMES_DIR)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Recorded perception log (overrides INVIGIL_REPLAY_PATH)
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Calibrate when this frame index is reached
    #[arg(long)]
    calibrate_at: Option<u64>,

    /// Do not expose the D-Bus interface
    #[arg(long)]
    no_dbus: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let result = runtime.block_on(run(args));
    // In-flight emotion classifications are abandoned rather than awaited
    runtime.shutdown_background();
    result
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(frames) = args.frames {
        if std::env::var_os("INVIGIL_REPLAY_PATH").is_none() && args.replay.is_none() {
            config.replay_path = frames.join("perception.jsonl");
        }
        config.frames_dir = frames;
    }
    if let Some(replay) = args.replay {
        config.replay_path = replay;
    }
    if args.calibrate_at.is_some() {
        config.calibrate_at_frame = args.calibrate_at;
    }
    if args.no_dbus {
        config.dbus_enabled = false;
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("session", id = %session_id);

    tracing::info!(
        parent: &span,
        frames_dir = %config.frames_dir.display(),
        replay = %config.replay_path.display(),
        object_interval = config.object_interval,
        emotion_interval = config.emotion_interval,
        "invigild starting"
    );

    let log = ReplayLog::load(&config.replay_path).context("loading perception replay")?;
    if log.is_empty() {
        tracing::warn!(parent: &span, "replay log has no records; no face will be seen");
    }
    let collaborators = replay::collaborators(Arc::new(log), config.detector.clone());

    let (engine, done) = span
        .in_scope(|| engine::spawn_engine(&config, collaborators, tokio::runtime::Handle::current()))
        .context("starting engine")?;

    // Held for the lifetime of the process; dropping it releases the bus name.
    let _connection = if config.dbus_enabled {
        let service = InvigilService {
            engine: engine.clone(),
            session_id: session_id.clone(),
        };
        let builder = if config.session_bus {
            zbus::connection::Builder::session()?
        } else {
            zbus::connection::Builder::system()?
        };
        let connection = builder
            .name(BUS_NAME)?
            .serve_at(OBJECT_PATH, service)?
            .build()
            .await
            .context("registering D-Bus service")?;
        tracing::info!(parent: &span, bus = BUS_NAME, session_bus = config.session_bus, "D-Bus interface ready");
        Some(connection)
    } else {
        None
    };

    tokio::select! {
        summary = done => {
            match summary {
                Ok(summary) => tracing::info!(
                    parent: &span,
                    frames = summary.frames,
                    alert_frames = summary.alert_frames,
                    skipped = summary.skipped_frames,
                    object_runs = summary.scheduler.object_runs,
                    emotion_dispatches = summary.scheduler.emotion_dispatches,
                    final_buffer = summary.final_buffer,
                    "frame source exhausted"
                ),
                Err(_) => tracing::error!(parent: &span, "engine thread exited without a summary"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(parent: &span, "invigild shutting down");
        }
    }

    Ok(())
}
