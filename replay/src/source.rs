use image::ImageReader;
use impact_common::frame::Frame;
use std::path::{Path, PathBuf};

use crate::ReplayError;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, ReplayError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ReplayError::ReadDir(dir.to_path_buf(), e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ReplayError::ReadDir(dir.to_path_buf(), e))?;
        let path = entry.path();
        if path.is_file() && is_frame_file(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

pub fn load_frame(path: &Path) -> Result<Frame, ReplayError> {
    let img = ImageReader::open(path)
        .map_err(|e| ReplayError::Open(path.to_path_buf(), e))?
        .with_guessed_format()
        .map_err(|e| ReplayError::Open(path.to_path_buf(), e))?
        .decode()
        .map_err(|e| ReplayError::Decode(path.to_path_buf(), e))?;
    Ok(Frame::from(img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("impact-replay-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn recognizes_image_extensions() {
        assert!(is_frame_file(Path::new("frames/0001.png")));
        assert!(is_frame_file(Path::new("frames/0002.JPG")));
        assert!(is_frame_file(Path::new("a.jpeg")));
        assert!(!is_frame_file(Path::new("notes.txt")));
        assert!(!is_frame_file(Path::new("README")));
    }

    #[test]
    fn lists_only_frames_in_name_order() {
        let dir = scratch_dir("list");
        for name in ["0003.png", "0001.png", "0002.png"] {
            RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(dir.join(name)).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();
        std::fs::create_dir(dir.join("nested.png")).unwrap();

        let names: Vec<_> = list_frames(&dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0001.png", "0002.png", "0003.png"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn decodes_png_into_frame() {
        let dir = scratch_dir("decode");
        let path = dir.join("frame.png");
        let mut img = RgbImage::from_pixel(6, 3, Rgb([200, 10, 10]));
        img.put_pixel(5, 2, Rgb([1, 2, 3]));
        img.save(&path).unwrap();

        let frame = load_frame(&path).unwrap();
        assert_eq!((frame.width(), frame.height()), (6, 3));
        assert_eq!(frame.rgb(5, 2), [1, 2, 3]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = scratch_dir("corrupt");
        let path = dir.join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really").unwrap();

        assert!(matches!(load_frame(&path), Err(ReplayError::Decode(..))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_reported() {
        let err = list_frames(Path::new("/nonexistent/frames")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/frames"));
    }
}
