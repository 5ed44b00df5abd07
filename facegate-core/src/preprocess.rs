//! Preprocessing of full images and face crops into model input tensors.
//!
//! The detector expects `(pixel - 127) / 160` in RGB order. The classifier
//! expects `pixel / 255` in BGR order. Both take a `[1, 3, H, W]` f32 tensor.

use anyhow::Result;
use facegate_utils::{ChannelOrder, Normalization, normalized_chw, resize_rgb, stage_timer};
use image::RgbImage;
use tract_onnx::prelude::Tensor;

use crate::engine::InputSize;

/// Detector input normalization.
pub const DETECTOR_NORMALIZATION: Normalization =
    Normalization::new(127.0, 1.0 / 160.0, ChannelOrder::Rgb);

/// Classifier input normalization.
pub const CLASSIFIER_NORMALIZATION: Normalization =
    Normalization::new(0.0, 1.0 / 255.0, ChannelOrder::Bgr);

/// Normalization applied to each model's input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessConfig {
    pub detector: Normalization,
    pub classifier: Normalization,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            detector: DETECTOR_NORMALIZATION,
            classifier: CLASSIFIER_NORMALIZATION,
        }
    }
}

/// Resize `image` to `size` and build a normalized `[1, 3, H, W]` tensor.
pub fn image_to_tensor(image: &RgbImage, size: InputSize, norm: &Normalization) -> Result<Tensor> {
    let _timer = stage_timer("facegate_core::image_to_tensor", log::Level::Trace);
    anyhow::ensure!(
        size.width > 0 && size.height > 0,
        "model input dimensions must be greater than zero"
    );
    let (src_w, src_h) = image.dimensions();
    anyhow::ensure!(
        src_w > 0 && src_h > 0,
        "source image dimensions must be greater than zero"
    );

    let resized = resize_rgb(image, size.width, size.height);
    let chw = normalized_chw(&resized, norm);
    let shape = [1usize, 3, size.height as usize, size.width as usize];
    let (data, offset) = chw.into_raw_vec_and_offset();
    debug_assert_eq!(offset, Some(0), "expected contiguous array");
    Tensor::from_shape(&shape, &data).map_err(|e| anyhow::anyhow!("failed to build tensor: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn detector_tensor_has_expected_shape_and_values() {
        let image = RgbImage::from_pixel(320, 240, Rgb([127, 255, 47]));
        let tensor =
            image_to_tensor(&image, InputSize::new(160, 120), &DETECTOR_NORMALIZATION).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 120, 160]);

        let data = tensor.as_slice::<f32>().unwrap();
        let plane = 160 * 120;
        assert_eq!(data[0], 0.0);
        assert!((data[plane] - 128.0 / 160.0).abs() < 1e-5);
        assert!((data[2 * plane] + 0.5).abs() < 1e-5);
    }

    #[test]
    fn classifier_tensor_is_bgr_unit_range() {
        let image = RgbImage::from_pixel(7, 9, Rgb([255, 0, 51]));
        let tensor =
            image_to_tensor(&image, InputSize::new(32, 32), &CLASSIFIER_NORMALIZATION).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);

        let data = tensor.as_slice::<f32>().unwrap();
        let plane = 32 * 32;
        assert!((data[0] - 0.2).abs() < 1e-5);
        assert_eq!(data[plane], 0.0);
        assert!((data[2 * plane] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_empty_source() {
        let image = RgbImage::new(0, 4);
        assert!(image_to_tensor(&image, InputSize::new(4, 4), &DETECTOR_NORMALIZATION).is_err());
    }
}
