/// Common test utilities and macros for CLI integration tests
use std::path::PathBuf;

use image::{ImageBuffer, Rgb};

/// Detector and classifier models, when both are available locally.
pub struct ModelPaths {
    pub detector: PathBuf,
    pub classifier: PathBuf,
}

fn find_first(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

pub fn find_model_paths() -> Option<ModelPaths> {
    let detector = find_first(&[
        "models/face_detector_160x120.onnx",
        "../models/face_detector_160x120.onnx",
    ])?;
    let classifier = find_first(&[
        "models/face_classifier_32.onnx",
        "../models/face_classifier_32.onnx",
    ])?;
    Some(ModelPaths {
        detector,
        classifier,
    })
}

/// Write a small synthetic RGB image and return its path.
pub fn write_test_image(path: &std::path::Path) -> image::ImageResult<()> {
    let img = ImageBuffer::from_fn(64, 48, |x, y| {
        let r = ((x * 4 + y) % 255) as u8;
        Rgb([r, 128, 255u8.saturating_sub(r)])
    });
    img.save(path)
}

/// Macro to set up a model-dependent CLI test; skips the test when models are absent.
///
/// Creates:
/// - `models: ModelPaths` - detector and classifier locations
/// - `temp_dir: TempDir` - temporary directory
/// - `input_path: PathBuf` - a synthetic PNG inside `temp_dir`
#[macro_export]
macro_rules! cli_test_setup {
    () => {{
        let models = match $crate::common::find_model_paths() {
            Some(m) => m,
            None => {
                eprintln!("Skipping test: models not found");
                return;
            }
        };

        let temp_dir = tempfile::TempDir::new().expect("create temp dir");
        let input_path = temp_dir.path().join("input.png");
        $crate::common::write_test_image(&input_path).expect("write input image");

        (models, temp_dir, input_path)
    }};
}

/// Macro to assert CLI success and optionally print stderr on failure.
#[macro_export]
macro_rules! assert_cli_success {
    ($output:expr, $msg:literal) => {{
        if !$output.status.success() {
            eprintln!("CLI stderr: {}", String::from_utf8_lossy(&$output.stderr));
        }
        assert!($output.status.success(), $msg);
    }};
}
