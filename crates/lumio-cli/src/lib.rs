//! Shared helpers for the `lumio` binary: file loading, batch manifests and
//! the JSON run summary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use lumio_core::{OrderStatus, OrderUploadQueue, PhotoFile, PhotoStatus};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for the CLI. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read a file from disk into a [`PhotoFile`] named after its final path
/// component.
pub async fn load_photo(path: &Path) -> Result<PhotoFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let payload = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(PhotoFile::new(name, payload))
}

/// One order in a batch manifest.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ManifestOrder {
    pub order_id: String,
    /// Defaults to the order id.
    #[serde(default)]
    pub order_name: Option<String>,
    pub files: Vec<PathBuf>,
}

impl ManifestOrder {
    pub fn display_name(&self) -> &str {
        self.order_name.as_deref().unwrap_or(&self.order_id)
    }
}

/// JSON manifest for `lumio batch`:
///
/// ```json
/// { "orders": [ { "order_id": "1001", "order_name": "Smith wedding", "files": ["a.jpg"] } ] }
/// ```
///
/// Relative file paths are resolved against the manifest's directory.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Manifest {
    pub orders: Vec<ManifestOrder>,
}

impl Manifest {
    pub fn parse(json: &str, base_dir: &Path) -> Result<Self> {
        let mut manifest: Manifest =
            serde_json::from_str(json).context("Failed to parse manifest")?;
        for order in &mut manifest.orders {
            if order.order_id.trim().is_empty() {
                anyhow::bail!("Manifest contains an order without order_id");
            }
            for file in &mut order.files {
                if file.is_relative() {
                    *file = base_dir.join(&*file);
                }
            }
        }
        Ok(manifest)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&json, base_dir)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhotoSummary {
    pub uid: String,
    pub name: String,
    pub status: PhotoStatus,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final state of one order after the run.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub order_name: String,
    pub status: OrderStatus,
    pub progress: u8,
    pub done: usize,
    pub failed: usize,
    pub canceled: usize,
    pub photos: Vec<PhotoSummary>,
}

impl From<&OrderUploadQueue> for OrderSummary {
    fn from(queue: &OrderUploadQueue) -> Self {
        Self {
            order_id: queue.order_id.clone(),
            order_name: queue.order_name.clone(),
            status: queue.status,
            progress: queue.progress,
            done: queue.count(PhotoStatus::Done),
            failed: queue.count(PhotoStatus::Error),
            canceled: queue.count(PhotoStatus::Abort),
            photos: queue
                .photos
                .iter()
                .map(|p| PhotoSummary {
                    uid: p.uid.clone(),
                    name: p.name.clone(),
                    status: p.status,
                    retry_count: p.retry_count,
                    error: p.error_msg.clone(),
                })
                .collect(),
        }
    }
}

/// One progress line per order, e.g. `#1001 [Uploading]  50%`.
pub fn progress_line(queue: &OrderUploadQueue) -> String {
    format!(
        "{} [{:?}] {:>3}%",
        truncate_string(&queue.order_name, 32),
        queue.status,
        queue.progress
    )
}
