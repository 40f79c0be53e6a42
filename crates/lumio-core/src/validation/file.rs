//! Photo file validation.
//!
//! Files that fail here never enter an upload queue.

use std::path::Path;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::models::PhotoFile;

/// Map an image file name to its expected Content-Type by extension.
pub fn content_type_for(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())?;

    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        "heic" => Some("image/heic"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// Rejects non-image, empty and oversized files before enqueue.
#[derive(Debug, Clone)]
pub struct PhotoValidator {
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl PhotoValidator {
    pub fn new(max_file_size: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_extensions.clone(),
        )
    }

    pub fn validate(&self, file: &PhotoFile) -> Result<(), UploadError> {
        if file.name.trim().is_empty() {
            return Err(UploadError::InvalidInput(
                "File name must not be empty".to_string(),
            ));
        }

        self.validate_type(file)?;

        let size = file.size();
        if size == 0 {
            return Err(UploadError::EmptyFile(file.name.clone()));
        }

        if size > self.max_file_size {
            return Err(UploadError::FileTooLarge {
                name: file.name.clone(),
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    fn validate_type(&self, file: &PhotoFile) -> Result<(), UploadError> {
        let unsupported = || UploadError::UnsupportedFileType {
            name: file.name.clone(),
            allowed: self.allowed_extensions.clone(),
        };

        let extension = Path::new(&file.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(unsupported)?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(unsupported());
        }

        if !file.content_type.to_lowercase().starts_with("image/") {
            return Err(unsupported());
        }

        Ok(())
    }
}

impl Default for PhotoValidator {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}
