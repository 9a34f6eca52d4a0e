use std::path::{Path, PathBuf};

use chrono::Utc;
use spdlog::info;
use uuid::Uuid;

use crate::error::{ContentError, Result};
use crate::store::file_store::atomic_write;

pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;
pub const IMAGES_URL_PREFIX: &str = "/images";

const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub url: String,
}

/// File extension for an accepted content type. Parameters like `; charset` are ignored.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    ALLOWED_TYPES.iter()
        .find(|(allowed, _)| *allowed == mime)
        .map(|(_, ext)| *ext)
}

pub fn validate(content_type: &str, size: usize, max_size: usize) -> Result<&'static str> {
    if size == 0 {
        return Err(ContentError::InvalidUpload("no image data provided".to_string()));
    }
    let ext = extension_for(content_type).ok_or_else(|| {
        let allowed: Vec<&str> = ALLOWED_TYPES.iter().map(|(mime, _)| *mime).collect();
        ContentError::InvalidUpload(format!(
            "invalid file type '{}', allowed types: {}", content_type, allowed.join(", ")
        ))
    })?;
    if size > max_size {
        return Err(ContentError::InvalidUpload(format!(
            "file size ({} bytes) exceeds limit of {} bytes", size, max_size
        )));
    }
    Ok(ext)
}

fn unique_file_name(ext: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}.{}", Utc::now().timestamp_millis(), &id[..8], ext)
}

/// Validates and stores an uploaded image under `images_dir`.
pub fn store_image(images_dir: &Path, content_type: &str, data: &[u8], max_size: usize) -> Result<StoredImage> {
    let ext = validate(content_type, data.len(), max_size)?;
    let file_name = unique_file_name(ext);
    let path = images_dir.join(&file_name);

    atomic_write(&path, data)?;
    info!("Stored image {} ({} bytes)", path.display(), data.len());

    Ok(StoredImage {
        path,
        url: format!("{}/{}", IMAGES_URL_PREFIX, file_name),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for(""), None);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(validate("image/png", 0, MAX_IMAGE_SIZE), Err(ContentError::InvalidUpload(_))));
        assert!(matches!(validate("text/html", 10, MAX_IMAGE_SIZE), Err(ContentError::InvalidUpload(_))));
        assert!(matches!(validate("image/gif", MAX_IMAGE_SIZE + 1, MAX_IMAGE_SIZE), Err(ContentError::InvalidUpload(_))));
        assert_eq!(validate("image/webp", MAX_IMAGE_SIZE, MAX_IMAGE_SIZE).unwrap(), "webp");
    }

    #[test]
    fn test_store_image() {
        let tmp = TempDir::new().unwrap();
        let images_dir = tmp.path().join("images");

        let stored = store_image(&images_dir, "image/png", b"\x89PNG fake", MAX_IMAGE_SIZE).unwrap();
        let file_name = stored.path.file_name().unwrap().to_str().unwrap();

        assert!(file_name.ends_with(".png"));
        assert_eq!(stored.url, format!("/images/{}", file_name));
        assert_eq!(fs::read(&stored.path).unwrap(), b"\x89PNG fake");

        let other = store_image(&images_dir, "image/png", b"\x89PNG other", MAX_IMAGE_SIZE).unwrap();
        assert_ne!(other.path, stored.path);
    }
}
