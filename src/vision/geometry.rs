//! Normalized bounding-box geometry
//!
//! All coordinates live in the 0..1 space of the source frame with the origin
//! at the top-left corner.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (0.0 - 1.0)
    pub x: f32,
    /// Top edge (0.0 - 1.0)
    pub y: f32,
    /// Width (0.0 - 1.0)
    pub width: f32,
    /// Height (0.0 - 1.0)
    pub height: f32,
}

/// Pixel rectangle (x, y, width, height)
pub type PixelRect = (u32, u32, u32, u32);

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Center point as (x, y)
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Intersection-over-Union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let iy = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;

        if union <= f32::EPSILON {
            return 0.0;
        }

        intersection / union
    }

    /// Euclidean distance between the two box centers
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        distance(self.center(), other.center())
    }

    /// Grow the box by `margin` (fraction of its own size) on every side,
    /// clamped to the unit square.
    pub fn expanded(&self, margin: f32) -> BoundingBox {
        let dx = self.width * margin;
        let dy = self.height * margin;

        let x0 = (self.x - dx).clamp(0.0, 1.0);
        let y0 = (self.y - dy).clamp(0.0, 1.0);
        let x1 = (self.right() + dx).clamp(0.0, 1.0);
        let y1 = (self.bottom() + dy).clamp(0.0, 1.0);

        BoundingBox::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }

    /// Convert to a pixel rectangle inside an image of the given size.
    ///
    /// Edges are rounded to the nearest pixel and never extend past the image.
    pub fn to_pixels(&self, img_width: u32, img_height: u32) -> PixelRect {
        let fw = img_width as f32;
        let fh = img_height as f32;

        let x0 = (self.x.clamp(0.0, 1.0) * fw).round() as u32;
        let y0 = (self.y.clamp(0.0, 1.0) * fh).round() as u32;
        let x1 = (self.right().clamp(0.0, 1.0) * fw).round() as u32;
        let y1 = (self.bottom().clamp(0.0, 1.0) * fh).round() as u32;

        let x0 = x0.min(img_width);
        let y0 = y0.min(img_height);
        let x1 = x1.min(img_width).max(x0);
        let y1 = y1.min(img_height).max(y0);

        (x0, y0, x1 - x0, y1 - y0)
    }
}

/// Euclidean distance between two normalized points
pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}
