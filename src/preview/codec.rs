use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use thiserror::Error;

/// Image decode/resize/encode failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("pixel buffer does not match {width}x{height}")]
    BadDimensions { width: u32, height: u32 },
}

/// A decoded RGB image.
pub struct RgbPixels {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode a JPEG into RGB pixels.
pub fn decode_jpeg(jpeg: &[u8]) -> Result<RgbPixels, CodecError> {
    let rgb = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?.to_rgb8();
    Ok(RgbPixels {
        width: rgb.width(),
        height: rgb.height(),
        data: rgb.into_raw(),
    })
}

/// Decode any supported image format (PNG, JPEG, GIF, BMP) into RGB pixels.
pub fn decode_image(bytes: &[u8]) -> Result<RgbPixels, CodecError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    Ok(RgbPixels {
        width: rgb.width(),
        height: rgb.height(),
        data: rgb.into_raw(),
    })
}

/// Resize raw RGB data to exactly `target_width` x `target_height`.
///
/// Uses `fast_image_resize` for SIMD-accelerated resizing.
pub fn resize_rgb(
    pixels: &RgbPixels,
    target_width: u32,
    target_height: u32,
) -> Result<RgbPixels, CodecError> {
    use fast_image_resize as fr;
    use fr::images::Image;

    let src_image = Image::from_vec_u8(
        pixels.width,
        pixels.height,
        pixels.data.clone(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| CodecError::Resize(e.to_string()))?;

    let mut dst_image = Image::new(target_width, target_height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, None)
        .map_err(|e| CodecError::Resize(e.to_string()))?;

    Ok(RgbPixels {
        data: dst_image.into_vec(),
        width: target_width,
        height: target_height,
    })
}

/// Encode RGB pixels as a 24-bit uncompressed BMP.
pub fn encode_bmp(pixels: RgbPixels) -> Result<Vec<u8>, CodecError> {
    let (width, height) = (pixels.width, pixels.height);
    let img = RgbImage::from_raw(width, height, pixels.data)
        .ok_or(CodecError::BadDimensions { width, height })?;
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Bmp)?;
    Ok(buf)
}

/// Encode a synthetic gradient as JPEG, for tests that need real frames.
#[cfg(test)]
pub(crate) fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    use image::codecs::jpeg::JpegEncoder;

    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, 80);
    img.write_with_encoder(encoder).unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a synthetic RGB test image (gradient pattern).
    fn make_test_rgb(width: u32, height: u32) -> RgbPixels {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x % 256) as u8);
                data.push((y % 256) as u8);
                data.push(128);
            }
        }
        RgbPixels {
            data,
            width,
            height,
        }
    }

    #[test]
    fn decode_jpeg_reports_dimensions() {
        let jpeg = test_jpeg(32, 24);
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let pixels = decode_jpeg(&jpeg).unwrap();
        assert_eq!((pixels.width, pixels.height), (32, 24));
        assert_eq!(pixels.data.len(), 32 * 24 * 3);
    }

    #[test]
    fn decode_jpeg_rejects_garbage() {
        assert!(decode_jpeg(&[0xFF, 0xD8, 0x00, 0x01, 0xFF, 0xD9]).is_err());
    }

    #[test]
    fn decode_image_sniffs_format() {
        let bmp = encode_bmp(make_test_rgb(12, 9)).unwrap();
        let pixels = decode_image(&bmp).unwrap();
        assert_eq!((pixels.width, pixels.height), (12, 9));

        let jpeg = decode_image(&test_jpeg(10, 10)).unwrap();
        assert_eq!(jpeg.width, 10);
    }

    #[test]
    fn resize_produces_requested_dimensions() {
        let src = make_test_rgb(640, 480);
        let dst = resize_rgb(&src, 80, 60).unwrap();
        assert_eq!((dst.width, dst.height), (80, 60));
        assert_eq!(dst.data.len(), 80 * 60 * 3);
    }

    #[test]
    fn encode_bmp_writes_bitmap_header() {
        let bmp = encode_bmp(make_test_rgb(80, 60)).unwrap();
        assert_eq!(&bmp[..2], b"BM");
        assert!(bmp.len() >= 80 * 60 * 3);
    }

    #[test]
    fn encode_bmp_rejects_mismatched_buffer() {
        let pixels = RgbPixels {
            data: vec![0; 10],
            width: 80,
            height: 60,
        };
        assert!(matches!(
            encode_bmp(pixels),
            Err(CodecError::BadDimensions { .. })
        ));
    }
}
