//! Shared fixtures for the unit tests: tiny in-memory PNGs and canned
//! content records. Compiled only under `cfg(test)`.

use std::io::Cursor;

use image::{DynamicImage, Rgb, RgbImage};

use crate::imaging::prepare_image;
use crate::types::{ContentSource, GeneratedContent, SourceImage, TokenUsage};

/// A single-color PNG, encoded in memory.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode_png(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

/// A PNG with a horizontal gradient, so neighboring pixels differ.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode_png(img)
}

fn encode_png(img: RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// A gradient JPEG without any metadata, encoded in memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .unwrap();
    buf.into_inner()
}

/// A gradient JPEG carrying an EXIF orientation tag, the way phone cameras
/// store rotated captures. `orientation` is the raw EXIF value (1..=8).
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    // Minimal EXIF block: little-endian TIFF header, one IFD0 entry for
    // tag 0x0112 (Orientation, SHORT), no next IFD.
    let mut exif = Vec::new();
    exif.extend_from_slice(b"Exif\0\0");
    exif.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);
    exif.extend_from_slice(&[0x01, 0x00]);
    exif.extend_from_slice(&[0x12, 0x01, 0x03, 0x00, 0x01, 0x00, 0x00, 0x00]);
    exif.extend_from_slice(&orientation.to_le_bytes());
    exif.extend_from_slice(&[0x00, 0x00]);
    exif.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    // Splice an APP1 segment right after the SOI marker.
    let jpeg = jpeg_bytes(width, height);
    let mut out = Vec::with_capacity(jpeg.len() + exif.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&(exif.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(&exif);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// A fully prepared [`SourceImage`] in the given solid color.
pub fn source_image(rgb: [u8; 3]) -> SourceImage {
    prepare_image(&solid_png(64, 64, rgb)).unwrap()
}

/// A red-dominant image, for exercising the warm-mood path.
pub fn warm_image() -> SourceImage {
    source_image([220, 80, 40])
}

/// A content record with the stock hashtag set and the given caption.
pub fn sample_content(caption: &str) -> GeneratedContent {
    GeneratedContent {
        caption: caption.to_string(),
        hashtags: vec![
            "#travel".to_string(),
            "#wanderlust".to_string(),
            "#goodvibes".to_string(),
            "#discover".to_string(),
        ],
        usage: TokenUsage {
            input: 1120,
            output: 96,
        },
        source: ContentSource::Generated,
    }
}
