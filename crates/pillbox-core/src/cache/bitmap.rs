//! Preview image decoding.
//!
//! Encoded bytes are fully decoded into an RGBA bitmap, so a corrupt body
//! fails here instead of at draw time. The encoded bytes are kept for
//! hosts that hand them to an external renderer.

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

/// Image container formats accepted for previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl ImageFormat {
    fn from_guessed(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::WebP => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    fn codec(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }

    /// Sniff the format from the leading magic bytes.
    pub fn guess(bytes: &[u8]) -> Option<Self> {
        image::guess_format(bytes).ok().and_then(Self::from_guessed)
    }

    pub fn mime_type(self) -> &'static str {
        self.codec().to_mime_type()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
        };
        f.write_str(name)
    }
}

/// A preview image ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub bitmap: RgbaImage,
    pub bytes: Arc<Vec<u8>>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Decode an encoded preview into a bitmap.
pub fn decode(bytes: Arc<Vec<u8>>) -> Result<DecodedImage, String> {
    let guessed = image::guess_format(&bytes).map_err(|e| e.to_string())?;
    let format = ImageFormat::from_guessed(guessed)
        .ok_or_else(|| format!("unsupported image format {guessed:?}"))?;
    let bitmap = image::load_from_memory_with_format(&bytes, guessed)
        .map_err(|e| format!("malformed {format} image: {e}"))?
        .into_rgba8();
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Err(format!("empty {format} image"));
    }
    Ok(DecodedImage {
        format,
        bitmap,
        bytes,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;

    use image::{DynamicImage, Rgb, RgbImage};

    pub fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 40])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).expect("encode test image");
        out.into_inner()
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        encode(width, height, image::ImageFormat::Png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_png_to_bitmap() {
        let img = decode(Arc::new(fixtures::png(64, 32))).unwrap();
        assert_eq!(img.format, ImageFormat::Png);
        assert_eq!((img.width(), img.height()), (64, 32));
        assert_eq!(img.bitmap.get_pixel(10, 10).0, [200, 40, 40, 255]);
    }

    #[test]
    fn test_decode_jpeg_and_gif() {
        let jpeg = decode(Arc::new(fixtures::encode(20, 10, image::ImageFormat::Jpeg))).unwrap();
        assert_eq!((jpeg.format, jpeg.width(), jpeg.height()), (ImageFormat::Jpeg, 20, 10));

        let gif = decode(Arc::new(fixtures::encode(32, 16, image::ImageFormat::Gif))).unwrap();
        assert_eq!((gif.format, gif.width(), gif.height()), (ImageFormat::Gif, 32, 16));
    }

    #[test]
    fn test_decode_rejects_garbage_and_truncation() {
        assert!(decode(Arc::new(b"hello".to_vec())).is_err());
        assert!(decode(Arc::new(b"\x89PNG\r\n\x1a\n".to_vec())).is_err());

        // Header intact, pixel data cut short.
        let mut truncated = fixtures::png(16, 16);
        truncated.truncate(truncated.len() - 20);
        assert!(decode(Arc::new(truncated)).is_err());
    }

    #[test]
    fn test_decode_rejects_unsupported_format() {
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 64]);
        let err = decode(Arc::new(bmp)).unwrap_err();
        assert!(err.contains("unsupported"), "{err}");
    }

    #[test]
    fn test_guess_and_mime_type() {
        assert_eq!(ImageFormat::guess(&fixtures::png(1, 1)), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::guess(b"plain text"), None);
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
    }
}
