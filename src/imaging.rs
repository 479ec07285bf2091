//! Image decoding and normalization.
//!
//! Every input photograph — whatever its container format — is decoded once,
//! rotated upright per its EXIF orientation tag, normalized to RGB8, and
//! re-encoded as JPEG. The JPEG is what gets embedded in the sheet and what
//! the generation endpoint sees, so the rest of the pipeline never touches
//! the original bytes again.
//!
//! The upright step matters: phone cameras store portrait shots as rotated
//! landscape pixels plus an orientation tag. Reading stored dimensions
//! without applying the tag would hand the layout fitter an inverted aspect
//! ratio and print the photo sideways.
//!
//! Normalization also derives the two cheap signals the pipeline needs:
//! the content hash (SHA-256 of a 64×64 downscale, so re-saved or
//! re-compressed copies of the same photo still hit the cache) and the
//! warm/cool mood bit used for fallback captions.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageReader, RgbImage, imageops};
use thiserror::Error;

use crate::cache::hash_pixels;
use crate::types::SourceImage;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// JPEG quality for the normalized re-encode.
const JPEG_QUALITY: u8 = 90;

/// Edge length of the downscale used for hashing and mood detection.
const PREVIEW_EDGE: u32 = 64;

/// Decode raw upload bytes into a normalized [`SourceImage`].
///
/// Fails only when the bytes can't be decoded at all; the caller turns that
/// into a placeholder page rather than aborting the batch.
pub fn prepare_image(raw: &[u8]) -> Result<SourceImage, ImagingError> {
    let rgb = decode_upright(raw)?.to_rgb8();

    let small = imageops::thumbnail(&rgb, PREVIEW_EDGE, PREVIEW_EDGE);
    let content_hash = hash_pixels(small.as_raw());
    let warm = is_warm(&small);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;

    Ok(SourceImage {
        width: rgb.width(),
        height: rgb.height(),
        jpeg,
        content_hash,
        warm,
    })
}

/// Decode and rotate upright per the EXIF orientation tag.
///
/// The plain decode path never applies orientation on its own; it has to be
/// read off the decoder and applied explicitly before any dimension is
/// trusted. A missing or unreadable tag means no transform.
fn decode_upright(raw: &[u8]) -> Result<DynamicImage, ImagingError> {
    let mut decoder = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut dynamic = DynamicImage::from_decoder(decoder)?;
    dynamic.apply_orientation(orientation);
    Ok(dynamic)
}

/// Red-versus-blue average over the downscaled pixels, as in the classic
/// warm/cool split. Ties count as warm.
fn is_warm(small: &RgbImage) -> bool {
    let (mut red, mut blue) = (0u64, 0u64);
    for pixel in small.pixels() {
        red += pixel.0[0] as u64;
        blue += pixel.0[2] as u64;
    }
    red >= blue
}
