//! Background-difference motion extraction.
//!
//! The analyzer compares each frame against a fixed background reference
//! captured from the first frame of the session. The reference is never
//! refreshed while the session runs, so gradual lighting changes accumulate
//! as difference; callers that care must restart the session.
//!
//! Extraction is a pure function of `(frame, background)`: grayscale, blur,
//! absolute difference, binarize, dilate, then connected-component labelling.
//! The returned region set is deterministic for identical inputs; region
//! order is not part of the contract.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};
use thiserror::Error;

use crate::frame::Frame;
use crate::zones::Rect;

/// Blur strength. Chosen to match a 21x21 Gaussian kernel, wide enough to
/// suppress sensor noise.
const BLUR_SIGMA: f32 = 3.5;
/// Binarization threshold for the background difference, out of 255.
const DIFF_THRESHOLD: u8 = 25;
/// Dilation radius merging fragmented change into coherent blobs
/// (equivalent to two 3x3 passes).
const DILATE_RADIUS: u8 = 2;

/// Unexpected failure inside the analysis stage.
#[derive(Debug, Error)]
#[error("processing failed: {0}")]
pub struct ProcessingError(String);

impl ProcessingError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A connected region of pixel change in one frame. Ephemeral: regions are
/// classified and discarded, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionRegion {
    /// Bounding box in source-frame pixel coordinates, corners inclusive.
    pub bounds: Rect,
    /// Pixel count of the region.
    pub area: u32,
}

/// Blurred grayscale snapshot of the session's first frame.
///
/// Immutable for the lifetime of the session.
pub struct BackgroundModel {
    reference: GrayImage,
}

impl BackgroundModel {
    pub fn from_frame(frame: &Frame) -> Self {
        let gray = to_gray(frame);
        Self {
            reference: gaussian_blur_f32(&gray, BLUR_SIGMA),
        }
    }

    pub fn width(&self) -> u32 {
        self.reference.width()
    }

    pub fn height(&self) -> u32 {
        self.reference.height()
    }
}

/// Extract candidate motion regions from `frame` relative to `background`.
pub fn detect_regions(
    frame: &Frame,
    background: &BackgroundModel,
) -> Result<Vec<MotionRegion>, ProcessingError> {
    if frame.width != background.width() || frame.height != background.height() {
        return Err(ProcessingError::new(format!(
            "frame is {}x{} but the background reference is {}x{}",
            frame.width,
            frame.height,
            background.width(),
            background.height()
        )));
    }

    let blurred = gaussian_blur_f32(&to_gray(frame), BLUR_SIGMA);

    let mut mask = GrayImage::new(frame.width, frame.height);
    for ((out, current), reference) in mask
        .iter_mut()
        .zip(blurred.iter())
        .zip(background.reference.iter())
    {
        let delta = (*current as i16 - *reference as i16).unsigned_abs();
        *out = if delta > DIFF_THRESHOLD as u16 { 255 } else { 0 };
    }

    let mask = dilate(&mask, Norm::LInf, DILATE_RADIUS);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    struct Extent {
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
        area: u32,
    }

    let mut extents: BTreeMap<u32, Extent> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|extent| {
                extent.min_x = extent.min_x.min(x);
                extent.min_y = extent.min_y.min(y);
                extent.max_x = extent.max_x.max(x);
                extent.max_y = extent.max_y.max(y);
                extent.area += 1;
            })
            .or_insert(Extent {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                area: 1,
            });
    }

    Ok(extents
        .into_values()
        .filter(|extent| extent.max_x > extent.min_x && extent.max_y > extent.min_y)
        .map(|extent| MotionRegion {
            bounds: Rect {
                x1: extent.min_x as i32,
                y1: extent.min_y as i32,
                x2: extent.max_x as i32,
                y2: extent.max_y as i32,
            },
            area: extent.area,
        })
        .collect())
}

fn to_gray(frame: &Frame) -> GrayImage {
    let mut gray = GrayImage::new(frame.width, frame.height);
    for (out, rgb) in gray.iter_mut().zip(frame.data().chunks_exact(3)) {
        // Rec. 601 luma weights.
        let luma =
            (rgb[0] as u32 * 299 + rgb[1] as u32 * 587 + rgb[2] as u32 * 114 + 500) / 1000;
        *out = luma as u8;
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, level: u8) -> Frame {
        Frame::new(
            vec![level; width as usize * height as usize * 3],
            width,
            height,
        )
        .unwrap()
    }

    fn frame_with_square(width: u32, height: u32, square: (u32, u32, u32, u32)) -> Frame {
        let mut data = vec![0u8; width as usize * height as usize * 3];
        let (x1, y1, x2, y2) = square;
        for y in y1..y2 {
            for x in x1..x2 {
                let index = ((y * width + x) * 3) as usize;
                data[index..index + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        Frame::new(data, width, height).unwrap()
    }

    fn sorted(mut regions: Vec<MotionRegion>) -> Vec<MotionRegion> {
        regions.sort_by_key(|region| (region.bounds.x1, region.bounds.y1));
        regions
    }

    #[test]
    fn identical_frames_produce_no_regions() {
        let frame = solid_frame(100, 100, 0);
        let background = BackgroundModel::from_frame(&frame);
        assert!(detect_regions(&frame, &background).unwrap().is_empty());
    }

    #[test]
    fn white_square_yields_one_region_around_it() {
        let background = BackgroundModel::from_frame(&solid_frame(100, 100, 0));
        let frame = frame_with_square(100, 100, (10, 10, 40, 40));

        let regions = detect_regions(&frame, &background).unwrap();
        assert_eq!(regions.len(), 1);

        // Blur and dilation grow the blob outward, so the bounding box covers
        // the painted square with a modest margin on every side.
        let region = &regions[0];
        assert!(region.bounds.x1 <= 10 && region.bounds.x1 >= 0);
        assert!(region.bounds.y1 <= 10 && region.bounds.y1 >= 0);
        assert!(region.bounds.x2 >= 39 && region.bounds.x2 <= 60);
        assert!(region.bounds.y2 >= 39 && region.bounds.y2 <= 60);
        assert!(
            region.area >= 900 && region.area <= 2600,
            "unexpected area {}",
            region.area
        );
    }

    #[test]
    fn separated_squares_yield_separate_regions() {
        let background = BackgroundModel::from_frame(&solid_frame(160, 100, 0));
        let mut frame = frame_with_square(160, 100, (10, 10, 30, 30));
        let second = frame_with_square(160, 100, (120, 60, 140, 80));
        let merged: Vec<u8> = frame
            .data()
            .iter()
            .zip(second.data())
            .map(|(a, b)| *a.max(b))
            .collect();
        frame = Frame::new(merged, 160, 100).unwrap();

        let regions = sorted(detect_regions(&frame, &background).unwrap());
        assert_eq!(regions.len(), 2);
        assert!(regions[0].bounds.x2 < 120);
        assert!(regions[1].bounds.x1 > 30);
    }

    #[test]
    fn extraction_is_deterministic() {
        let background = BackgroundModel::from_frame(&solid_frame(100, 100, 0));
        let frame = frame_with_square(100, 100, (10, 10, 40, 40));
        let first = sorted(detect_regions(&frame, &background).unwrap());
        let second = sorted(detect_regions(&frame, &background).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn dimension_mismatch_is_a_processing_error() {
        let background = BackgroundModel::from_frame(&solid_frame(100, 100, 0));
        let frame = solid_frame(64, 64, 0);
        assert!(detect_regions(&frame, &background).is_err());
    }
}
