//! Face crop extraction.

use image::RgbImage;

use crate::geometry::Detection;

/// Integer pixel rectangle of a face inside the source image.
///
/// Always non-empty and fully inside the image it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceCrop {
    /// Derive a crop from a detection on an image of `width` x `height`.
    ///
    /// Corners are truncated toward zero, then clamped to the image. Returns
    /// `None` when the clamped rectangle is empty.
    pub fn from_detection(detection: &Detection, width: u32, height: u32) -> Option<Self> {
        let bbox = detection.bbox;
        // `as` saturates and maps NaN to 0.
        let x1 = (bbox.x1 as i64).max(0);
        let y1 = (bbox.y1 as i64).max(0);
        let x2 = (bbox.x2 as i64).min(width as i64);
        let y2 = (bbox.y2 as i64).min(height as i64);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }

    /// Copy the crop out of `image`.
    pub fn extract(&self, image: &RgbImage) -> RgbImage {
        image::imageops::crop_imm(image, self.x, self.y, self.width, self.height).to_image()
    }
}
