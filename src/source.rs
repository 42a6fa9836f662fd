//! Frame sources.
//!
//! The capture side of the pipeline is opaque to the core: a source is
//! opened from a fully-resolved address string, read one frame at a time,
//! and closed exactly once by the pump's finalize path. Real capture
//! integrations (RTSP, local devices) live behind this trait; the bundled
//! synthetic source serves `stub://` identifiers for tests and demos.
//!
//! Sources hand every frame out by value. They must not retain a copy.

use thiserror::Error;

use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;
/// Frames per simulated motion cycle: two thirds quiet, one third with a
/// moving block in view.
const SYNTHETIC_CYCLE: u64 = 270;

/// Errors crossing the source boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be opened.
    #[error("connection failed: {0}")]
    Connect(String),
    /// A read failed after the source was opened.
    #[error("read failed: {0}")]
    Read(String),
}

/// Outcome of a single blocking read.
pub enum FrameRead {
    Frame(Frame),
    /// The stream ended cleanly.
    Eof,
}

/// A stream of frames from one capture device or network stream.
pub trait FrameSource: Send {
    /// Blocking read of the next frame. No timeout: a stalled source blocks
    /// the caller until it produces a frame or fails.
    fn read_frame(&mut self) -> Result<FrameRead, SourceError>;

    /// Release the capture resource. The pump calls this exactly once, from
    /// its finalize path.
    fn close(&mut self);
}

/// Open a source for a canonical address.
///
/// `stub://` addresses resolve to the synthetic source. Anything else needs
/// a capture integration supplied by the embedder.
pub fn open_frame_source(identifier: &str) -> Result<Box<dyn FrameSource>, SourceError> {
    if let Some(name) = identifier.strip_prefix("stub://") {
        return Ok(Box::new(SyntheticSource::open(name)));
    }
    Err(SourceError::Connect(format!(
        "no capture backend available for '{}'",
        identifier
    )))
}

/// Synthetic source: a static gradient scene with a bright block that
/// periodically sweeps through, producing real motion episodes.
pub struct SyntheticSource {
    name: String,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn open(name: &str) -> Self {
        let name = if name.is_empty() { "camera" } else { name };
        log::info!("synthetic source '{}' opened", name);
        Self {
            name: name.to_string(),
            frame_count: 0,
        }
    }

    fn render(&self) -> Vec<u8> {
        let width = SYNTHETIC_WIDTH as usize;
        let height = SYNTHETIC_HEIGHT as usize;
        let mut data = vec![0u8; width * height * 3];
        for y in 0..height {
            for x in 0..width {
                let level = (((x / 8) ^ (y / 8)) % 24 + 32) as u8;
                let index = (y * width + x) * 3;
                data[index..index + 3].copy_from_slice(&[level, level, level]);
            }
        }

        // One third of each cycle, a bright block drifts across the scene.
        let phase = self.frame_count % SYNTHETIC_CYCLE;
        if phase >= SYNTHETIC_CYCLE / 3 * 2 {
            let step = phase - SYNTHETIC_CYCLE / 3 * 2;
            let block_x = (40 + step * 4) as usize % (width - 64);
            let block_y = height / 2 - 32;
            for y in block_y..block_y + 64 {
                for x in block_x..block_x + 64 {
                    let index = (y * width + x) * 3;
                    data[index..index + 3].copy_from_slice(&[230, 230, 230]);
                }
            }
        }
        data
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<FrameRead, SourceError> {
        self.frame_count += 1;
        let frame = Frame::new(self.render(), SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT)
            .map_err(|e| SourceError::Read(e.to_string()))?;
        Ok(FrameRead::Frame(frame))
    }

    fn close(&mut self) {
        log::info!(
            "synthetic source '{}' closed after {} frames",
            self.name,
            self.frame_count
        );
    }
}
