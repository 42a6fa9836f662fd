//! vigild - motion vigilance daemon
//!
//! This daemon:
//! 1. Loads configuration (file, environment, CLI overrides)
//! 2. Starts one frame-pump session against the configured source
//! 3. Drains the event channel on a fixed tick, forwarding events to the log
//! 4. Stops the session cleanly on ctrl-c or when the stream ends

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;

use vigil_kernel::{
    ConnectionTarget, Event, EventChannel, FramePump, VigildConfig, POLL_INTERVAL,
};

#[derive(Debug, Parser)]
#[command(name = "vigild", version, about = "Motion vigilance daemon")]
struct Args {
    /// Path to the JSON configuration file (also VIGIL_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source address override, e.g. rtsp://... or stub://front_camera.
    #[arg(long)]
    source: Option<String>,

    /// Sensitivity override: minimum motion area in pixels.
    #[arg(long, value_parser = clap::value_parser!(u32).range(50..=5000))]
    sensitivity: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = VigildConfig::load(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.target = ConnectionTarget::Direct(source);
    }
    if let Some(sensitivity) = args.sensitivity {
        cfg.sensitivity = sensitivity;
    }
    let session = cfg.session()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("failed to install the ctrl-c handler")?;
    }

    log::info!(
        "vigild {} starting: source={} sensitivity={} target_fps={}",
        env!("CARGO_PKG_VERSION"),
        session.source,
        session.sensitivity,
        session.target_fps
    );

    let channel = Arc::new(EventChannel::new());
    let mut pump = FramePump::new(Arc::clone(&channel));
    pump.start(session)?;

    let mut alert_count = 0u64;
    while !shutdown.load(Ordering::SeqCst) {
        forward_events(&channel, &mut alert_count);
        if !pump.is_running() {
            // The session ended on its own (lost stream or startup failure).
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    pump.stop();
    forward_events(&channel, &mut alert_count);
    log::info!("vigild exited ({} alerts raised)", alert_count);
    Ok(())
}

fn forward_events(channel: &EventChannel, alert_count: &mut u64) {
    for event in channel.drain() {
        match event {
            Event::Log(msg) | Event::Info(msg) => log::info!("{}", msg),
            Event::Warning(msg) => log::warn!("{}", msg),
            Event::Error(msg) => log::error!("{}", msg),
            Event::AlertRaised => {
                *alert_count += 1;
                log::warn!("ALERT #{}: motion in frame", alert_count);
            }
            Event::Frame { frame, motion } => {
                log::debug!("frame {}x{} motion={}", frame.width, frame.height, motion);
            }
        }
    }
}
