//! Batch pre-render runner.
//!
//! Usage: `thalassa <config.yaml> [snapshots.jsonl|frames.bin]`
//!
//! Runs the configured simulation to its end date without a visual
//! loop and writes the recorded snapshot frames as JSON Lines (or
//! bincode when the output path ends in `.bin`).
//!
//! Exit codes: 0 success, 2 invalid configuration, 3 data unavailable,
//! 4 corrupt binary, 5 cancelled.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use thalassa_core::fields::{EddyDiffusivity, OceanFlow};
use thalassa_core::{EngineError, EngineEvent, RunConfig, SnapshotFrame};
use thalassa_engine::Simulation;
use thalassa_fields::{CurrentField, DiffusivityField};
use thalassa_observability::init_observability;

#[tokio::main]
async fn main() -> ExitCode {
    init_observability();
    info!("thalassa batch runner v{}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        eprintln!("usage: thalassa <config.yaml> [snapshots.jsonl|frames.bin]");
        return ExitCode::from(2);
    };
    let output = args.next().map(PathBuf::from);

    match run(&config_path, output).await {
        Ok(frames) => {
            info!(frames, "run complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(config_path: &str, output: Option<PathBuf>) -> Result<usize, EngineError> {
    let config = RunConfig::load(config_path)
        .map_err(|e| EngineError::Configuration(format!("{}: {}", config_path, e)))?;

    let flow: Arc<dyn OceanFlow> =
        Arc::new(CurrentField::open(config.archives.currents_dir.clone()).await?);
    let diffusivity: Option<Arc<dyn EddyDiffusivity>> = match &config.archives.eke_dir {
        Some(dir) => Some(Arc::new(DiffusivityField::open(dir.clone()).await?)),
        None => None,
    };

    let mut sim = Simulation::new(config, flow, diffusivity)?;

    // progress/completion logging off the engine bus
    let mut events = sim.bus().subscribe();
    let logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::Progress { percent, message } => info!(percent, "{}", message),
                EngineEvent::Complete {
                    frames, elapsed_ms, ..
                } => info!(frames, elapsed_ms, "pre-render finished"),
                EngineEvent::Halted { error, .. } => error!("halted: {}", error),
                EngineEvent::FrameReady(_) => {}
            }
        }
    });

    // ctrl-c cancels between recorded frames
    let cancel = sim.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = sim.prerender().await;
    logger.abort();
    let buffer = result?;

    if let Some(path) = output {
        write_frames(&path, buffer.frames()).map_err(|e| EngineError::io(&path, &e))?;
        info!(path = %path.display(), frames = buffer.len(), "snapshots written");
    }
    Ok(buffer.len())
}

fn write_frames(path: &Path, frames: &[SnapshotFrame]) -> std::io::Result<()> {
    use std::io::Write;

    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    if path.extension().is_some_and(|ext| ext == "bin") {
        let bytes = bincode::serialize(frames)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        out.write_all(&bytes)?;
    } else {
        for frame in frames {
            serde_json::to_writer(&mut out, frame)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()
}
