use std::io::Cursor;

use fast_image_resize::{self as fir, images::Image as FirImage};
use serde::{Deserialize, Serialize};

/// Compact perceptual fingerprint of an image: a 64-bit average hash and a
/// 64-bit difference hash over a 9x8 luminance thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub ahash: u64,
    pub dhash: u64,
}

impl Fingerprint {
    /// Normalized similarity in `[0, 1]`; 1.0 for identical fingerprints.
    /// Symmetric by construction: Hamming distance does not depend on order.
    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        let distance = hamming_distance(self.ahash, other.ahash)
            + hamming_distance(self.dhash, other.dhash);
        1.0 - f64::from(distance) / 128.0
    }
}

/// Fingerprint encoded image bytes. Returns None if the bytes cannot be decoded.
///
/// Uses a hybrid decode strategy:
/// - JPEG: `turbojpeg` full-resolution grayscale decode (feature-gated, skips chroma)
/// - Other formats: `image` crate decode, RGB resize to 9x8, then grayscale conversion
///
/// Both paths apply EXIF orientation before resizing, so a rotated drawing
/// of a model sheet fingerprints the same as a physically rotated export.
pub fn compute_fingerprint(bytes: &[u8]) -> Option<Fingerprint> {
    let pixels = load_9x8_grayscale(bytes)?;
    Some(Fingerprint {
        ahash: compute_ahash(&pixels),
        dhash: compute_dhash(&pixels),
    })
}

/// Decode and produce a 9x8 grayscale pixel buffer ready for hashing.
fn load_9x8_grayscale(bytes: &[u8]) -> Option<[u8; 72]> {
    #[cfg(feature = "turbojpeg")]
    if is_jpeg(bytes) {
        if let Some(raster) = decode_jpeg_gray(bytes) {
            return raster.oriented(read_exif_orientation(bytes)).thumbnail();
        }
    }

    let rgb = image::load_from_memory(bytes).ok()?.to_rgb8();
    let raster = Raster {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
        channels: 3,
        pixels: rgb.into_raw(),
    };
    raster.oriented(read_exif_orientation(bytes)).thumbnail()
}

/// Check the JPEG SOI marker.
#[cfg(feature = "turbojpeg")]
fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFF, 0xD8, 0xFF])
}

/// Full-resolution grayscale JPEG decode; chroma is never reconstructed.
#[cfg(feature = "turbojpeg")]
fn decode_jpeg_gray(bytes: &[u8]) -> Option<Raster> {
    let mut decompressor = turbojpeg::Decompressor::new().ok()?;
    let header = decompressor.read_header(bytes).ok()?;
    let (width, height) = (header.width, header.height);

    let mut pixels = vec![0u8; width * height];
    let output = turbojpeg::Image {
        pixels: pixels.as_mut_slice(),
        width,
        pitch: width,
        height,
        format: turbojpeg::PixelFormat::GRAY,
    };
    decompressor.decompress(bytes, output).ok()?;
    Some(Raster {
        pixels,
        width,
        height,
        channels: 1,
    })
}

/// Read EXIF orientation tag (1-8). Returns 1 (normal) if missing or unreadable.
fn read_exif_orientation(bytes: &[u8]) -> u8 {
    let read = || -> Option<u8> {
        let mut reader = Cursor::new(bytes);
        let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
        let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
        field.value.get_uint(0).map(|v| v as u8)
    };
    read().unwrap_or(1)
}

/// Row-major decoded pixels, `channels` bytes each (1 = luma, 3 = RGB).
struct Raster {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
    channels: usize,
}

impl Raster {
    /// Undo an EXIF orientation (2-8). Orientations 5-8 swap width and height.
    fn oriented(self, orientation: u8) -> Raster {
        if !(2..=8).contains(&orientation) {
            return self;
        }
        let (w, h, c) = (self.width, self.height, self.channels);
        let (out_w, out_h) = if orientation >= 5 { (h, w) } else { (w, h) };
        let mut out = vec![0u8; self.pixels.len()];

        for y in 0..h {
            for x in 0..w {
                let (dx, dy) = match orientation {
                    2 => (w - 1 - x, y),
                    3 => (w - 1 - x, h - 1 - y),
                    4 => (x, h - 1 - y),
                    5 => (y, x),
                    6 => (h - 1 - y, x),
                    7 => (h - 1 - y, w - 1 - x),
                    _ => (y, w - 1 - x),
                };
                let src = (y * w + x) * c;
                let dst = (dy * out_w + dx) * c;
                out[dst..dst + c].copy_from_slice(&self.pixels[src..src + c]);
            }
        }
        Raster {
            pixels: out,
            width: out_w,
            height: out_h,
            channels: c,
        }
    }

    /// SIMD-resize to the 9x8 hashing grid, then reduce to luma (BT.601).
    /// Only the 72 output pixels are converted.
    fn thumbnail(self) -> Option<[u8; 72]> {
        let pixel_type = match self.channels {
            1 => fir::PixelType::U8,
            _ => fir::PixelType::U8x3,
        };
        let src = FirImage::from_vec_u8(self.width as u32, self.height as u32, self.pixels, pixel_type).ok()?;
        let mut dst = FirImage::new(9, 8, pixel_type);
        fir::Resizer::new().resize(&src, &mut dst, None).ok()?;

        let buf = dst.buffer();
        let mut gray = [0u8; 72];
        for (i, px) in gray.iter_mut().enumerate() {
            *px = match self.channels {
                1 => buf[i],
                _ => {
                    let rgb = &buf[i * 3..i * 3 + 3];
                    (0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32) as u8
                }
            };
        }
        Some(gray)
    }
}

/// Compute average hash (aHash) from 9x8 grayscale pixels.
/// Uses the left 8x8 block. Each bit = 1 if pixel >= mean, 0 otherwise.
fn compute_ahash(pixels: &[u8]) -> u64 {
    // Extract 8x8 block from 9-wide rows
    let mut block = [0u8; 64];
    for row in 0..8 {
        for col in 0..8 {
            block[row * 8 + col] = pixels[row * 9 + col];
        }
    }

    let mean: u64 = block.iter().map(|&p| p as u64).sum::<u64>() / 64;
    let mut hash: u64 = 0;
    for (i, &pixel) in block.iter().enumerate() {
        if pixel as u64 >= mean {
            hash |= 1 << i;
        }
    }
    hash
}

/// Compute difference hash (dHash) from 9x8 grayscale pixels.
/// For each row of 9 pixels, compare adjacent pairs → 8 bits per row × 8 rows = 64 bits.
fn compute_dhash(pixels: &[u8]) -> u64 {
    let mut hash: u64 = 0;
    let mut bit = 0;
    for row in 0..8 {
        for col in 0..8 {
            let left = pixels[row * 9 + col];
            let right = pixels[row * 9 + col + 1];
            if left > right {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

/// Compute the Hamming distance between two hash values.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}
