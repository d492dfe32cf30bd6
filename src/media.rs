//! Image references stored on records: either an inline `data:image/...;base64,`
//! URI or an externally hosted `http(s)` URL.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

use crate::errors::ServiceError;

/// Upper bound for a decoded inline image.
pub const MAX_INLINE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_MIME: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/svg+xml",
];

pub fn validate_image_ref(value: &str) -> Result<(), ServiceError> {
    let value = value.trim();
    if let Some(rest) = value.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ServiceError::ValidationError("Malformed data URI".to_string()))?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            ServiceError::ValidationError("Data URI images must be base64 encoded".to_string())
        })?;
        if !ALLOWED_MIME.contains(&mime) {
            return Err(ServiceError::ValidationError(format!(
                "Unsupported image type: {}",
                mime
            )));
        }
        let bytes = STANDARD.decode(payload).map_err(|e| {
            ServiceError::ValidationError(format!("Invalid base64 image payload: {}", e))
        })?;
        if bytes.is_empty() || bytes.len() > MAX_INLINE_IMAGE_BYTES {
            return Err(ServiceError::ValidationError(format!(
                "Inline image must be between 1 byte and {} bytes",
                MAX_INLINE_IMAGE_BYTES
            )));
        }
        return Ok(());
    }

    let url = Url::parse(value)
        .map_err(|e| ServiceError::ValidationError(format!("Invalid image URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(()),
        other => Err(ServiceError::ValidationError(format!(
            "Image URL scheme not allowed: {}",
            other
        ))),
    }
}

pub fn validate_image_refs(values: &[String]) -> Result<(), ServiceError> {
    values.iter().try_for_each(|v| validate_image_ref(v))
}

/// Encodes raw bytes as a data URI.
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_inline_and_remote_images() {
        let uri = to_data_uri("image/png", &[0x89, 0x50, 0x4e, 0x47]);
        assert!(validate_image_ref(&uri).is_ok());
        assert!(validate_image_ref("https://cdn.example.com/a.jpg").is_ok());
    }

    #[test]
    fn rejects_bad_payloads_and_schemes() {
        assert!(validate_image_ref("data:image/png;base64,***").is_err());
        assert!(validate_image_ref("data:text/html;base64,PGI+").is_err());
        assert!(validate_image_ref("data:image/png,plain").is_err());
        assert!(validate_image_ref("ftp://example.com/a.png").is_err());
        assert!(validate_image_ref("not a url").is_err());
    }
}
