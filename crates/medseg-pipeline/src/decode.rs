//! Image decoding into the pipeline's working formats.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, TIFF) and produces either a
//! 16-bit grayscale scan or an 8-bit RGB image. 8-bit sources are
//! widened to 16 bits by the `image` crate (`v * 257`), which the
//! max-relative rescaling in the filters undoes.

use crate::types::{Gray16Image, PipelineError, RgbImage};

/// Decode raw image bytes into a 16-bit grayscale image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_gray16(bytes: &[u8]) -> Result<Gray16Image, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_luma16())
}

/// Decode raw image bytes into an 8-bit RGB image.
///
/// # Errors
///
/// Same as [`decode_gray16`].
pub fn decode_rgb8(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGB image as PNG bytes.
    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode_gray16(&[]), Err(PipelineError::EmptyInput)));
        assert!(matches!(decode_rgb8(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_gray16(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn white_png_widens_to_u16_max() {
        let png = encode_png(&RgbImage::from_pixel(3, 2, image::Rgb([255, 255, 255])));
        let gray = decode_gray16(&png).unwrap();
        assert_eq!(gray.dimensions(), (3, 2));
        assert!(gray.pixels().all(|p| p.0[0] == u16::MAX));
    }

    #[test]
    fn rgb_round_trips_through_png() {
        let img = RgbImage::from_fn(4, 4, |x, y| {
            image::Rgb([
                u8::try_from(x * 60).unwrap(),
                u8::try_from(y * 60).unwrap(),
                7,
            ])
        });
        let decoded = decode_rgb8(&encode_png(&img)).unwrap();
        assert_eq!(decoded, img);
    }
}
