//! QR credential rendering.
//!
//! A credential is the verification URL for a ticket, encoded as a PNG and
//! wrapped in a data URL so the frontend can show, mail, or download it
//! without a second fetch.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use thiserror::Error;

const MIN_IMAGE_DIMENSIONS: u32 = 240;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("failed to encode QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("failed to render QR image: {0}")]
    Render(#[from] image::ImageError),
}

/// The URL a gate scanner lands on for a ticket.
pub fn verification_url(site_url: &str, ticket_id: &str) -> String {
    format!("{}/verify?t={}", site_url.trim_end_matches('/'), ticket_id)
}

/// Encode `contents` as a PNG QR code and return it as a base64 data URL.
pub fn render_png_data_url(contents: &str) -> Result<String, QrError> {
    let code = QrCode::new(contents.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_IMAGE_DIMENSIONS, MIN_IMAGE_DIMENSIONS)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}
