//! Coordinate math for detections: normalized-to-pixel mapping, overlap, clamping.

/// Added to the IoU denominator so degenerate boxes never divide by zero.
pub const IOU_EPSILON: f32 = 1e-5;

/// Axis-aligned bounding box in corner form, in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Map a normalized `[x1, y1, x2, y2]` box onto an image of `width` x `height`.
    ///
    /// x coordinates scale by the width and y coordinates by the height. No
    /// clamping is applied.
    pub fn from_normalized(normalized: [f32; 4], width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: normalized[0] * w,
            y1: normalized[1] * h,
            x2: normalized[2] * w,
            y2: normalized[3] * h,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Signed area. Inverted boxes yield a negative or zero value, matching the
    /// raw `(x2 - x1) * (y2 - y1)` used by the suppression overlap test.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    ///
    /// `intersection / (area_a + area_b - intersection + IOU_EPSILON)`; always
    /// finite and non-negative for finite, well-formed inputs.
    pub fn iou(&self, other: &Self) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = w * h;
        intersection / (self.area() + other.area() - intersection + IOU_EPSILON)
    }

    /// Clamp the box to `[0, width] x [0, height]`.
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        Self {
            x1: self.x1.max(0.0),
            y1: self.y1.max(0.0),
            x2: self.x2.min(width as f32),
            y2: self.y2.min(height as f32),
        }
    }

    /// `true` when the box has no positive extent along either axis.
    pub fn is_degenerate(&self) -> bool {
        !(self.x2 > self.x1 && self.y2 > self.y1)
    }
}

/// A detected face: pixel-space box plus the detector's foreground confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
}

impl Detection {
    pub const fn new(bbox: BoundingBox, score: f32) -> Self {
        Self { bbox, score }
    }
}
