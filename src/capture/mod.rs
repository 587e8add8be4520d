//! Frame Layer
//!
//! Camera acquisition belongs to the host; this layer only holds the frames it
//! hands over and cuts recognition regions out of them.

pub mod frame;

pub use frame::{CropError, FrameImage, MIN_CROP_SIZE};
