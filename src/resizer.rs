//! Image decoding and resampling front-end.
//!
//! Signature extraction works on a fixed 128x128 raster; this module turns
//! arbitrary encoded image bytes into that raster or reports the input as
//! unreadable.

use image::imageops::FilterType;

use crate::error::Result;
use crate::haar::NUM_PIXELS;

/// Decode `bytes` and resample to the working raster: interleaved RGB8,
/// row-major, exactly 128x128. Undecodable input is an [`Image`
/// error](crate::Error::Image).
pub fn decode_and_resize(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let resized = img.resize_exact(NUM_PIXELS as u32, NUM_PIXELS as u32, FilterType::Triangle);
    Ok(resized.to_rgb8().into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::haar::NUM_PIXELS_SQUARED;
    use std::io::Cursor;

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_resamples_to_working_raster() {
        for (w, h) in [(16, 16), (640, 480), (128, 128)] {
            let raster = decode_and_resize(&encode_png(w, h)).unwrap();
            assert_eq!(raster.len(), 3 * NUM_PIXELS_SQUARED);
        }
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        let err = decode_and_resize(b"not an image").unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let bytes = encode_png(64, 48);
        assert_eq!(
            decode_and_resize(&bytes).unwrap(),
            decode_and_resize(&bytes).unwrap()
        );
    }
}
