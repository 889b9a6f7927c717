use std::io::Cursor;

use image::ImageReader;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Largest processed image accepted back from the backend.
pub const MAX_RESPONSE_BYTES: usize = 100 * 1024 * 1024;

pub const SVG_MIME: &str = "image/svg+xml";

// How far into a text file to look for an `<svg` root element.
const SVG_SNIFF_WINDOW: usize = 1024;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageError {
    #[error("image bytes empty")]
    Empty,

    #[error("image too large: {size} bytes, max {max}")]
    TooLarge { size: usize, max: usize },

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("failed to read image header: {reason}")]
    Header { reason: String },
}

/// What the header of an encoded image says about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

/// MIME type of a file the user picked, judged by its magic bytes alone.
///
/// Anything a browser would offer for `image/*` passes, including formats
/// this crate cannot decode (TIFF, ICO, AVIF) and SVG documents. Decoding is
/// the backend's business.
pub fn sniff_upload(bytes: &[u8], max_bytes: Option<usize>) -> Result<String, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if let Some(max) = max_bytes.filter(|max| bytes.len() > *max) {
        return Err(ImageError::TooLarge {
            size: bytes.len(),
            max,
        });
    }

    if let Ok(format) = image::guess_format(bytes) {
        return Ok(format.to_mime_type().to_string());
    }
    if looks_like_svg(bytes) {
        return Ok(SVG_MIME.to_string());
    }
    Err(ImageError::UnsupportedFormat)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SVG_SNIFF_WINDOW)];
    // The window may end inside a multi-byte character.
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        Err(e) => match std::str::from_utf8(&head[..e.valid_up_to()]) {
            Ok(text) => text,
            Err(_) => return false,
        },
    };
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with('<') && text.contains("<svg")
}

/// Recognises an encoded image without decoding its pixels.
pub fn inspect(bytes: &[u8], max_bytes: usize) -> Result<ImageInfo, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    let format = image::guess_format(bytes).map_err(|_| ImageError::UnsupportedFormat)?;
    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| match e {
            image::ImageError::Unsupported(_) => ImageError::UnsupportedFormat,
            other => ImageError::Header {
                reason: other.to_string(),
            },
        })?;

    if width == 0 || height == 0 {
        return Err(ImageError::Header {
            reason: format!("zero-sized image {width}x{height}"),
        });
    }

    debug!(
        format = ?format,
        width,
        height,
        size_bytes = bytes.len(),
        "inspected image"
    );

    Ok(ImageInfo {
        mime: format.to_mime_type().to_string(),
        width,
        height,
    })
}
