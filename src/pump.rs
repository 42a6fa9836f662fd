//! Session lifecycle and the acquisition loop.
//!
//! A session covers exactly one opened frame source, from `start` to the
//! finalize step. The pump owns the capture handle and the current frame for
//! the whole session and drives the analysis pipeline once per accepted
//! frame; results leave through the event channel only. Every exit path
//! (user stop, lost stream, processing error) converges on one finalize
//! routine, so the capture resource is released exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::alert::AlertStateMachine;
use crate::analyze::{detect_regions, BackgroundModel};
use crate::events::{Event, EventChannel};
use crate::source::{open_frame_source, FrameRead, FrameSource, SourceError};
use crate::zones::{frame_has_motion, ZoneSet};

pub const DEFAULT_SOURCE: &str = "stub://front_camera";
pub const DEFAULT_SENSITIVITY: u32 = 500;
pub const DEFAULT_TARGET_FPS: u32 = 30;

/// Immutable configuration snapshot for one session.
///
/// Captured when the session starts; edits to live configuration surfaces
/// while a session runs take effect at the next start.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Canonical source address (see `config::ConnectionTarget`).
    pub source: String,
    /// Minimum region pixel area that counts as motion.
    pub sensitivity: u32,
    /// Soft cap on the acquisition rate, frames per second.
    pub target_fps: u32,
    pub zones: ZoneSet,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            sensitivity: DEFAULT_SENSITIVITY,
            target_fps: DEFAULT_TARGET_FPS,
            zones: ZoneSet::default(),
        }
    }
}

/// Opens a frame source from a canonical address. Injectable so tests can
/// substitute scripted sources.
pub type SourceOpener =
    Arc<dyn Fn(&str) -> Result<Box<dyn FrameSource>, SourceError> + Send + Sync>;

/// Owns the producer thread for one session at a time.
pub struct FramePump {
    channel: Arc<EventChannel>,
    opener: SourceOpener,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FramePump {
    pub fn new(channel: Arc<EventChannel>) -> Self {
        Self::with_opener(channel, Arc::new(open_frame_source))
    }

    pub fn with_opener(channel: Arc<EventChannel>, opener: SourceOpener) -> Self {
        Self {
            channel,
            opener,
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start a session with the given configuration snapshot.
    ///
    /// Opening the source and building the background reference happen on
    /// the session thread; failures surface as Error events on the channel.
    pub fn start(&mut self, config: SessionConfig) -> Result<()> {
        if self.is_running() {
            return Err(anyhow!("a session is already running"));
        }
        self.handle = None;
        self.stop_flag.store(false, Ordering::SeqCst);

        let stop = Arc::clone(&self.stop_flag);
        let channel = Arc::clone(&self.channel);
        let opener = Arc::clone(&self.opener);
        let handle = thread::Builder::new()
            .name("vigil-pump".to_string())
            .spawn(move || run_session(config, opener, channel, stop))
            .context("failed to spawn the session thread")?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Cooperative stop. Sets the stop flag and waits for the session thread
    /// to finalize; worst-case latency is one frame-read completion
    /// (unbounded if the source itself hangs).
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_session(
    config: SessionConfig,
    opener: SourceOpener,
    channel: Arc<EventChannel>,
    stop: Arc<AtomicBool>,
) {
    channel.publish(Event::Log(format!("starting stream from {}", config.source)));

    let mut source = match opener(&config.source) {
        Ok(source) => source,
        Err(e) => {
            // Nothing was opened; there is no resource to finalize.
            channel.publish(Event::Error(e.to_string()));
            return;
        }
    };
    channel.publish(Event::Log(format!("connected to {}", config.source)));

    let mut alerts = AlertStateMachine::new();
    drive_session(source.as_mut(), &config, &channel, &stop, &mut alerts);
    finalize(source, &mut alerts, &channel);
}

/// Single convergence point for every exit after the source was opened.
fn finalize(
    mut source: Box<dyn FrameSource>,
    alerts: &mut AlertStateMachine,
    channel: &EventChannel,
) {
    source.close();
    alerts.reset();
    channel.publish(Event::Log("stream stopped".to_string()));
}

fn drive_session(
    source: &mut dyn FrameSource,
    config: &SessionConfig,
    channel: &EventChannel,
    stop: &AtomicBool,
    alerts: &mut AlertStateMachine,
) {
    // The first frame becomes the background reference for the whole
    // session; it is never refreshed afterwards.
    let first = match source.read_frame() {
        Ok(FrameRead::Frame(frame)) if !frame.is_empty() => frame,
        Ok(FrameRead::Frame(_)) | Ok(FrameRead::Eof) => {
            channel.publish(Event::Error(
                "source produced an empty first frame".to_string(),
            ));
            return;
        }
        Err(e) => {
            channel.publish(Event::Error(e.to_string()));
            return;
        }
    };
    let background = BackgroundModel::from_frame(&first);
    let zones = config.zones.clamp_to(first.width, first.height);
    log::debug!(
        "session background {}x{}, {} detection / {} ignore zones",
        first.width,
        first.height,
        zones.detection.len(),
        zones.ignore.len()
    );

    let interval = Duration::from_secs_f64(1.0 / config.target_fps.max(1) as f64);
    let mut last_accept = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        // Soft cadence: sleep out the rest of the tick, then re-check.
        let elapsed = last_accept.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
            continue;
        }
        last_accept = Instant::now();

        let mut frame = match source.read_frame() {
            Ok(FrameRead::Frame(frame)) => frame,
            Ok(FrameRead::Eof) => {
                channel.publish(Event::Log("stream lost".to_string()));
                return;
            }
            Err(e) => {
                channel.publish(Event::Log(format!("stream lost: {}", e)));
                return;
            }
        };

        let regions = match detect_regions(&frame, &background) {
            Ok(regions) => regions,
            Err(e) => {
                // Abort before annotating: a partially processed frame is
                // never emitted.
                channel.publish(Event::Error(e.to_string()));
                return;
            }
        };

        let motion = frame_has_motion(&regions, &zones, config.sensitivity);
        if alerts.observe(motion, Instant::now()) {
            channel.publish(Event::AlertRaised);
            channel.publish(Event::Log("motion detected".to_string()));
        }

        frame.annotate_status(motion);
        channel.publish(Event::Frame { frame, motion });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_rejects_a_second_session() {
        let channel = Arc::new(EventChannel::new());
        let mut pump = FramePump::new(Arc::clone(&channel));
        pump.start(SessionConfig::default()).unwrap();
        assert!(pump.start(SessionConfig::default()).is_err());
        pump.stop();
        assert!(!pump.is_running());
    }

    #[test]
    fn connection_failure_surfaces_an_error_event() {
        let channel = Arc::new(EventChannel::new());
        let mut pump = FramePump::new(Arc::clone(&channel));
        pump.start(SessionConfig {
            source: "rtsp://198.51.100.7:554/none".to_string(),
            ..SessionConfig::default()
        })
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while pump.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!pump.is_running());

        let drained = channel.drain();
        assert!(drained
            .iter()
            .any(|event| matches!(event, Event::Error(msg) if msg.contains("connection failed"))));
    }

    #[test]
    fn stopping_before_starting_is_harmless() {
        let channel = Arc::new(EventChannel::new());
        let mut pump = FramePump::new(channel);
        pump.stop();
        assert!(!pump.is_running());
    }
}
