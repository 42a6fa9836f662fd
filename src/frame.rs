//! Frame container.
//!
//! A [`Frame`] is a timestamped RGB pixel buffer. Frames are handed across
//! component boundaries by value or by clone only; no two components ever
//! share a mutable frame.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;
use std::time::SystemTime;

/// Top-left corner of the status indicator.
const STATUS_ANCHOR: (i32, i32) = (10, 10);
/// Side length of the status indicator, in pixels.
const STATUS_SIZE: u32 = 24;
const MOTION_COLOR: Rgb<u8> = Rgb([220, 40, 40]);
const QUIET_COLOR: Rgb<u8> = Rgb([40, 200, 80]);

/// One captured video frame: RGB8 pixels, row-major, 3 bytes per pixel.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: SystemTime,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer has {} bytes, expected {} for {}x{} RGB",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            captured_at: SystemTime::now(),
        })
    }

    /// A frame with no pixels. Sources can produce these on a stalled decode.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Draw the status indicator: a small filled block near the top-left
    /// corner, red while motion is detected and green otherwise.
    pub fn annotate_status(&mut self, motion: bool) {
        let data = std::mem::take(&mut self.data);
        let Some(mut image) = RgbImage::from_raw(self.width, self.height, data) else {
            return;
        };
        let color = if motion { MOTION_COLOR } else { QUIET_COLOR };
        let indicator =
            PixelRect::at(STATUS_ANCHOR.0, STATUS_ANCHOR.1).of_size(STATUS_SIZE, STATUS_SIZE);
        draw_filled_rect_mut(&mut image, indicator, color);
        self.data = image.into_raw();
    }
}
