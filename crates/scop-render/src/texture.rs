// SPDX-License-Identifier: CEPL-1.0
use std::path::Path;

use crate::RenderError;

/// Decoded RGBA8 pixels waiting to be uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Texture {
    /// Decodes any supported image file and converts it to RGBA8.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| RenderError::TextureDecode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if expected == 0 || pixels.len() != expected {
            return Err(RenderError::TextureSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_as_rgba8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duck.png");
        let img = image::RgbaImage::from_pixel(512, 512, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let tex = Texture::from_file(&path).unwrap();
        assert_eq!((tex.width(), tex.height()), (512, 512));
        assert_eq!(tex.pixels().len(), 512 * 512 * 4);
        assert_eq!(&tex.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn rgb_source_gains_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        image::RgbImage::from_pixel(2, 3, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let tex = Texture::from_file(&path).unwrap();
        assert_eq!(tex.pixels().len(), 2 * 3 * 4);
        assert_eq!(&tex.pixels()[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn missing_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Texture::from_file(dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, RenderError::TextureDecode { .. }));
    }

    #[test]
    fn raw_pixels_must_match_extent() {
        assert!(Texture::from_rgba8(2, 2, vec![0; 16]).is_ok());
        let err = Texture::from_rgba8(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, RenderError::TextureSize { expected: 16, actual: 15, .. }));
        assert!(Texture::from_rgba8(0, 4, vec![]).is_err());
    }
}
