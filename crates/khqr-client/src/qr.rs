//! QR rasterization.
//!
//! Payloads are rendered as PNG data URLs at error-correction level M.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageEncoder, Luma};
use qrcode::{EcLevel, QrCode};

use crate::error::ClientError;

/// Minimum rendered width and height, in pixels.
pub const QR_IMAGE_SIZE: u32 = 320;

/// Prefix of every data URL produced here.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Whether a backend-supplied QR image can be displayed as is.
pub fn is_usable_image(candidate: &str) -> bool {
    let c = candidate.trim();
    c.starts_with("data:image/") || c.starts_with("https://") || c.starts_with("http://")
}

/// Render `payload` as PNG bytes.
pub fn render_png(payload: &str) -> Result<Vec<u8>, ClientError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| ClientError::Render(e.to_string()))?;

    let image = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(QR_IMAGE_SIZE, QR_IMAGE_SIZE)
        .build();

    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|e| ClientError::Render(e.to_string()))?;
    Ok(bytes)
}

/// Render `payload` as a `data:image/png;base64,...` URL.
pub fn render_data_url(payload: &str) -> Result<String, ClientError> {
    let png = render_png(payload)?;
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png)))
}

/// Decode a PNG data URL produced by [`render_data_url`].
pub fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let encoded = data_url.trim().strip_prefix(PNG_DATA_URL_PREFIX)?;
    STANDARD.decode(encoded).ok()
}
