use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::validation::content_type_for;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    Pending,
    Uploading,
    Done,
    Error,
    Abort,
}

impl PhotoStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhotoStatus::Done | PhotoStatus::Error | PhotoStatus::Abort
        )
    }

    /// Error and Abort photos may be reset to Pending by an explicit retry.
    pub fn can_retry(&self) -> bool {
        matches!(self, PhotoStatus::Error | PhotoStatus::Abort)
    }
}

impl Display for PhotoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PhotoStatus::Pending => write!(f, "pending"),
            PhotoStatus::Uploading => write!(f, "uploading"),
            PhotoStatus::Done => write!(f, "done"),
            PhotoStatus::Error => write!(f, "error"),
            PhotoStatus::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for PhotoStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PhotoStatus::Pending),
            "uploading" => Ok(PhotoStatus::Uploading),
            "done" => Ok(PhotoStatus::Done),
            "error" => Ok(PhotoStatus::Error),
            "abort" => Ok(PhotoStatus::Abort),
            _ => Err(anyhow::anyhow!("Invalid photo status: {}", s)),
        }
    }
}

/// A file handed to the orchestrator for enqueueing.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub name: String,
    pub content_type: String,
    pub payload: Bytes,
}

impl PhotoFile {
    /// Content type is inferred from the file extension.
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let name = name.into();
        let content_type = content_type_for(&name)
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            name,
            content_type,
            payload: payload.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Upload lifecycle of a single file.
///
/// `file` holds the payload while the photo may still be sent (Pending,
/// Uploading, Error, Abort). It is released once the photo is Done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadPhoto {
    pub uid: String,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub status: PhotoStatus,
    pub progress: u8,
    pub retry_count: u32,
    pub error_msg: Option<String>,
    #[serde(skip)]
    pub file: Option<Bytes>,
    pub enqueued_at: DateTime<Utc>,
}

impl UploadPhoto {
    pub fn new(file: PhotoFile) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            name: file.name,
            content_type: file.content_type,
            size: file.payload.len() as u64,
            status: PhotoStatus::Pending,
            progress: 0,
            retry_count: 0,
            error_msg: None,
            file: Some(file.payload),
            enqueued_at: Utc::now(),
        }
    }

    pub fn has_payload(&self) -> bool {
        self.file.is_some()
    }
}
