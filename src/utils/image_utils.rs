// utils/image_utils.rs
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// A decoded image ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn extension(&self) -> &str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

/// Parses `data:image/<type>;base64,<data>` and enforces the MIME allow-list
/// and the size cap before anything is sent to storage.
pub fn parse_image_data_url(data_url: &str, max_size_mb: usize) -> Result<ImagePayload, String> {
    let pattern = Regex::new(r"^data:([a-zA-Z0-9.+/-]+);base64,(.+)$")
        .map_err(|_| "Invalid data url pattern".to_string())?;

    let captures = pattern
        .captures(data_url.trim())
        .ok_or_else(|| "Attachment must be a base64 encoded data url".to_string())?;

    let mut content_type = captures[1].to_lowercase();
    if content_type == "image/jpg" {
        content_type = "image/jpeg".to_string();
    }
    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err("Only PNG, JPEG, GIF or WEBP images are allowed".to_string());
    }

    let encoded = &captures[2];
    if !validate_image_size(encoded, max_size_mb) {
        return Err(format!("Image must be smaller than {}MB", max_size_mb));
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| format!("Failed to decode base64: {}", e))?;

    if bytes.len() > max_size_mb * 1024 * 1024 {
        return Err(format!("Image must be smaller than {}MB", max_size_mb));
    }

    Ok(ImagePayload {
        content_type,
        bytes,
    })
}

pub fn validate_image_size(base64_data: &str, max_size_mb: usize) -> bool {
    let size_in_bytes = (base64_data.len() * 3) / 4; // Approximate base64 size
    size_in_bytes <= max_size_mb * 1024 * 1024
}
