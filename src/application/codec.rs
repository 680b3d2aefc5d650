use base64::{prelude::BASE64_STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::frame::PixelGrid;

const JPEG_QUALITY: u8 = 80;
const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Decodifica una imagen comprimida (JPEG, PNG, ...) a RGB.
pub fn decode(bytes: &[u8]) -> DomainResult<PixelGrid> {
    if bytes.is_empty() {
        return Err(DomainError::Decode("buffer vacío".into()));
    }
    let img = image::load_from_memory(bytes).map_err(|e| DomainError::Decode(e.to_string()))?;
    let rgb = img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(DomainError::Decode("imagen sin píxeles".into()));
    }
    Ok(rgb)
}

/// Comprime a JPEG y lo envuelve como data URI.
pub fn encode(grid: &PixelGrid) -> DomainResult<String> {
    let mut jpeg = Vec::new();
    let mut enc = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    enc.encode(grid.as_raw(), grid.width(), grid.height(), ExtendedColorType::Rgb8)
        .map_err(|e| DomainError::Encode(e.to_string()))?;
    if jpeg.is_empty() {
        return Err(DomainError::Encode("salida JPEG vacía".into()));
    }
    Ok(format!("{}{}", DATA_URI_PREFIX, BASE64_STANDARD.encode(jpeg)))
}

/// Payload base64 de un mensaje `frame`. Acepta también un data URI completo.
pub fn decode_base64_payload(data: &str) -> DomainResult<Vec<u8>> {
    let payload = match data.split_once(',') {
        Some((head, rest)) if head.starts_with("data:") => rest,
        _ => data,
    };
    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|e| DomainError::Decode(format!("base64 inválido: {}", e)))
}
