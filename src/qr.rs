#![cfg(feature = "web")]
use image::{DynamicImage, Luma, imageops::FilterType};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode, Version};
use std::io::Cursor;

use crate::error::{Error, Result};

/// Width and height of a generated code in pixels
pub const QR_SIZE: u32 = 480;

pub const QR_FILE_NAME: &str = "qrcode.png";

/// Encodes `text` as a QR code PNG
///
/// # Arguments
/// * `text` - Payload embedded in the code
/// * `version` - Smallest symbol version to use, 1 to 40
///
/// # Returns
/// * PNG bytes of a `QR_SIZE` square image
///
/// # Implementation Notes
/// * Low error correction, 10 pixel modules and a 4 module quiet zone
/// * Text that does not fit `version` moves up to the smallest version that holds it
pub fn render_qr_png(text: &str, version: i16) -> Result<Vec<u8>> {
    if !(1..=40).contains(&version) {
        return Err(Error::Validation(
            "QR version must be an integer from 1 to 40.".to_string(),
        ));
    }

    let code = match QrCode::with_version(text.as_bytes(), Version::Normal(version), EcLevel::L) {
        Ok(code) => code,
        Err(QrError::DataTooLong) => {
            QrCode::with_error_correction_level(text.as_bytes(), EcLevel::L).map_err(qr_error)?
        }
        Err(e) => return Err(qr_error(e)),
    };

    let modules = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(10, 10)
        .build();
    let resized = image::imageops::resize(&modules, QR_SIZE, QR_SIZE, FilterType::Lanczos3);

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(resized)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|e| Error::Chart(e.to_string()))?;
    Ok(png)
}

fn qr_error(e: QrError) -> Error {
    Error::Validation(format!("Could not generate the QR code: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_square_png() {
        let png = render_qr_png("Hello, QR Code!", 1).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (QR_SIZE, QR_SIZE));
    }

    #[test]
    fn long_text_grows_past_the_requested_version() {
        let text = "x".repeat(200);
        assert!(render_qr_png(&text, 1).is_ok());
    }

    #[test]
    fn version_out_of_range_is_rejected() {
        assert!(matches!(render_qr_png("a", 0), Err(Error::Validation(_))));
        assert!(matches!(render_qr_png("a", 41), Err(Error::Validation(_))));
    }
}
