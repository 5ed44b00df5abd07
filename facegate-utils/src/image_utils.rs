use std::{borrow::Cow, path::Path};

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Load an image from disk into memory.
///
/// # Arguments
///
/// * `path` - The path to the image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Pixel layout of a decoded source image as seen by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// Three colour channels.
    Rgb,
    /// Three colour channels plus alpha; alpha is dropped.
    Rgba,
    /// Any other channel count (grey, grey + alpha).
    Unsupported(u8),
}

/// Classify a decoded image by channel count.
pub fn source_layout(image: &DynamicImage) -> SourceLayout {
    match image.color().channel_count() {
        3 => SourceLayout::Rgb,
        4 => SourceLayout::Rgba,
        other => SourceLayout::Unsupported(other),
    }
}

/// Borrow or convert an image as 8-bit RGB.
///
/// Returns `None` for layouts other than 3 or 4 channels.
pub fn to_rgb(image: &DynamicImage) -> Option<Cow<'_, RgbImage>> {
    match source_layout(image) {
        SourceLayout::Unsupported(_) => None,
        _ => Some(match image.as_rgb8() {
            Some(rgb) => Cow::Borrowed(rgb),
            None => Cow::Owned(image.to_rgb8()),
        }),
    }
}

/// Resize an RGB image to exactly `width` x `height` with a bilinear filter.
///
/// Images already at the requested size are borrowed unchanged.
pub fn resize_rgb(image: &RgbImage, width: u32, height: u32) -> Cow<'_, RgbImage> {
    if image.dimensions() == (width, height) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(image::imageops::resize(
            image,
            width,
            height,
            FilterType::Triangle,
        ))
    }
}

/// Channel order of a model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Per-channel normalization applied while building a model input tensor:
/// `(value - mean) * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: f32,
    pub scale: f32,
    pub order: ChannelOrder,
}

impl Normalization {
    pub const fn new(mean: f32, scale: f32, order: ChannelOrder) -> Self {
        Self { mean, scale, order }
    }

    #[inline]
    fn apply(&self, value: u8) -> f32 {
        (value as f32 - self.mean) * self.scale
    }
}

/// Convert an RGB image into a normalized CHW array.
///
/// # Arguments
///
/// * `image` - The RGB image to convert.
/// * `norm` - Mean, scale, and channel order to apply.
pub fn normalized_chw(image: &RgbImage, norm: &Normalization) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    let channels: [usize; 3] = match norm.order {
        ChannelOrder::Rgb => [0, 1, 2],
        ChannelOrder::Bgr => [2, 1, 0],
    };
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        for (plane, &source) in channels.iter().enumerate() {
            array[(plane, yi, xi)] = norm.apply(pixel[source]);
        }
    }
    array
}
