//! Frame data structures for camera frames handed over by the host

use image::{imageops, RgbaImage};
use thiserror::Error;

use crate::vision::BoundingBox;

/// Smallest region (in pixels, per side) worth sending to the recognizer
pub const MIN_CROP_SIZE: u32 = 10;

/// Region extraction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    /// Region after clamping is below the minimum size
    #[error("Crop {0}x{1} is smaller than the {MIN_CROP_SIZE}x{MIN_CROP_SIZE} minimum")]
    TooSmall(u32, u32),
}

/// A camera frame
#[derive(Debug)]
pub struct FrameImage {
    /// RGBA pixel data
    pub image: RgbaImage,
}

impl FrameImage {
    /// Create a new frame from decoded pixels
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Blank frame of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbaImage::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Crop the region covered by `bbox`, grown by `margin` on each side and
    /// clamped to the frame.
    pub fn crop(&self, bbox: &BoundingBox, margin: f32) -> Result<RgbaImage, CropError> {
        let (x, y, width, height) = bbox.expanded(margin).to_pixels(self.width(), self.height());

        if width < MIN_CROP_SIZE || height < MIN_CROP_SIZE {
            return Err(CropError::TooSmall(width, height));
        }

        Ok(imageops::crop_imm(&self.image, x, y, width, height).to_image())
    }
}
