//! Input collection.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::debug;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Resolve `--input` into the list of images to gate.
///
/// A file is gated as-is whatever its extension; a directory is walked
/// recursively and only files with a known image extension are kept, in sorted
/// order.
pub fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    anyhow::ensure!(
        path.is_dir(),
        "--input must be an image file or a directory of images: {}",
        path.display()
    );

    let mut images: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|candidate| {
            let keep = has_image_extension(candidate);
            if !keep {
                debug!("Ignoring {} (not a gateable image)", candidate.display());
            }
            keep
        })
        .collect();
    images.sort();
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_directories_for_images() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("b.PNG"), b"").unwrap();
        fs::write(nested.join("a.jpg"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let images = collect_images(dir.path()).unwrap();
        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|p| p.extension().is_some_and(|e| e != "txt")));
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_images(&dir.path().join("absent")).unwrap_err();
        assert!(err.to_string().contains("--input must be"));
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(has_image_extension(Path::new("a/b/face.JPeG")));
        assert!(has_image_extension(Path::new("face.webp")));
        assert!(!has_image_extension(Path::new("face.gif")));
        assert!(!has_image_extension(Path::new("README")));
    }
}
