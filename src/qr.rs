//! QR code rendering for public short-link URLs.

use qrcode::QrCode;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR payload must not be empty")]
    EmptyPayload,

    #[error("failed to encode QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("failed to render PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// Minimum rendered size in pixels; the module grid is scaled up to at
/// least this on both axes.
const MIN_DIMENSIONS: u32 = 256;

/// Encode a URL as a PNG image. The payload is the public redirect URL of a
/// short link; an empty payload is an error rather than a blank image.
pub fn encode_png(url: &str) -> Result<Vec<u8>, QrError> {
    if url.trim().is_empty() {
        return Err(QrError::EmptyPayload);
    }

    let code = QrCode::new(url.as_bytes())?;
    let img = code
        .render::<image::Luma<u8>>()
        .min_dimensions(MIN_DIMENSIONS, MIN_DIMENSIONS)
        .build();

    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;

    Ok(bytes)
}
