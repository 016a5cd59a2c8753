//! CPU copies of the accumulated image.

use std::path::Path;

use image::{ImageBuffer, Rgba, RgbaImage};
use thiserror::Error;

use crate::bridge::IMAGE_PIXEL_BYTES;
use crate::error::{DeviceError, FrameError};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Image data is {actual} bytes, expected {expected}")]
    Size { expected: u64, actual: u64 },

    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA. Alpha is always opaque.
pub fn color_to_rgba(color: [f32; 4]) -> [u8; 4] {
    let channel = |value: f32| (255.0 * linear_to_gamma(value).clamp(0.0, 1.0)) as u8;
    [channel(color[0]), channel(color[1]), channel(color[2]), 255]
}

/// Row-major offset of pixel `(x, y)`, computed wide enough for any image.
fn pixel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Linear RGBA pixels, row-major with row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSnapshot {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl ImageSnapshot {
    /// Decode the raw contents of the shared image buffer.
    pub fn from_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, SnapshotError> {
        let expected = width as u64 * height as u64 * IMAGE_PIXEL_BYTES;
        if bytes.len() as u64 != expected {
            return Err(SnapshotError::Size {
                expected,
                actual: bytes.len() as u64,
            });
        }

        let pixels = bytes
            .chunks_exact(IMAGE_PIXEL_BYTES as usize)
            .map(|pixel| {
                let mut rgba = [0.0; 4];
                for (channel, word) in rgba.iter_mut().zip(pixel.chunks_exact(4)) {
                    *channel = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                }
                rgba
            })
            .collect();

        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(pixel_index(self.width, x, y)).copied()
    }

    /// Gamma-corrected 8-bit image.
    pub fn to_rgba8(&self) -> RgbaImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            Rgba(color_to_rgba(self.pixels[pixel_index(self.width, x, y)]))
        })
    }

    /// Write a PNG (format chosen from the extension).
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        self.to_rgba8().save(path)?;
        log::info!("Saved {}x{} snapshot to {:?}", self.width, self.height, path);
        Ok(())
    }
}
