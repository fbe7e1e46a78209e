//! Image uploads stored on local disk and served from `/uploads`.

use std::path::Path;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Public path prefix the upload directory is mounted at.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Detect the image type from its leading bytes, ignoring what the client claims.
fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Check an upload and return the extension it will be stored under.
pub fn validate_image(original_name: &str, bytes: &[u8]) -> Result<&'static str, AppError> {
    let ext = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::bad_request(
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.",
        ));
    }
    if bytes.is_empty() {
        return Err(AppError::bad_request("Empty file"));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(AppError::bad_request("File too large. Maximum size is 5MB."));
    }
    let mime = detect_image_mime(bytes)
        .ok_or_else(|| AppError::bad_request("File content is not a valid image"))?;
    Ok(extension_for_mime(mime))
}

/// Validate and write an image under a random name. Returns its public path.
pub async fn store_image(dir: &Path, original_name: &str, bytes: &[u8]) -> Result<String, AppError> {
    let ext = validate_image(original_name, bytes)?;

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        tracing::error!("Failed to create upload directory: {}", e);
        AppError::internal("Failed to initialize upload directory")
    })?;

    let filename = format!("{}.{}", Uuid::new_v4(), ext);
    tokio::fs::write(dir.join(&filename), bytes).await.map_err(|e| {
        tracing::error!("Failed to write upload {}: {}", filename, e);
        AppError::internal("Failed to save file")
    })?;

    tracing::info!("Stored upload {} ({} bytes)", filename, bytes.len());
    Ok(format!("{}/{}", PUBLIC_PREFIX, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_magic_bytes_decide_the_type() {
        assert_eq!(validate_image("avatar.PNG", PNG).unwrap(), "png");
        assert_eq!(
            validate_image("avatar.jpg", &[0xFF, 0xD8, 0xFF, 0xE0]).unwrap(),
            "jpg"
        );
        assert!(validate_image("avatar.png", b"<svg></svg>").is_err());
    }

    #[test]
    fn test_extension_and_size_limits() {
        assert!(validate_image("script.exe", PNG).is_err());
        assert!(validate_image("noext", PNG).is_err());
        assert!(validate_image("empty.png", &[]).is_err());
        let mut big = PNG.to_vec();
        big.resize(MAX_FILE_SIZE + 1, 0);
        assert!(validate_image("big.png", &big).is_err());
    }

    #[tokio::test]
    async fn test_store_image_writes_random_name() {
        let dir = std::env::temp_dir().join(format!("uploads-test-{}", Uuid::new_v4()));
        let path = store_image(&dir, "../../etc/passwd.png", PNG).await.unwrap();
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".png"));
        assert!(!path.contains(".."));
        let name = path.trim_start_matches("/uploads/");
        assert!(dir.join(name).exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
