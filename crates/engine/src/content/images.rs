use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decoded RGBA8 pixels, row-major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl LoadedImage {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

pub fn load_image_rgba(path: &Path) -> Result<LoadedImage, ImageLoadError> {
    let reader = ImageReader::open(path).map_err(|source| ImageLoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| ImageLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decoded.to_rgba8();
    Ok(LoadedImage {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn decodes_png_into_rgba_bytes() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("hero.png");
        let mut source = RgbaImage::new(3, 2);
        source.put_pixel(2, 1, Rgba([10, 20, 30, 255]));
        source.save(&path).expect("save png");

        let loaded = load_image_rgba(&path).expect("load");

        assert_eq!((loaded.width, loaded.height), (3, 2));
        assert_eq!(loaded.rgba.len(), 3 * 2 * 4);
        assert_eq!(loaded.pixel(2, 1), Some([10, 20, 30, 255]));
        assert_eq!(loaded.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(loaded.pixel(3, 0), None);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = load_image_rgba(&dir.path().join("missing.png")).expect_err("err");
        assert!(matches!(err, ImageLoadError::Open { .. }), "{err}");
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png at all").expect("write");

        let err = load_image_rgba(&path).expect_err("err");
        assert!(matches!(err, ImageLoadError::Decode { .. }), "{err}");
    }
}
