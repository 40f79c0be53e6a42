//! Configuration module
//!
//! Upload orchestration settings: batch shape, retry policy, request timeout
//! and the file validation limits applied before a photo is enqueued.

use std::env;
use std::time::Duration;

const CHUNK_SIZE: usize = 4;
const CONCURRENCY: usize = 2;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_FILE_SIZE_MB: u64 = 50;
const ALLOWED_EXTENSIONS: &str = "jpg,jpeg,png,gif,webp,tif,tiff,heic";

/// Upload orchestrator configuration
#[derive(Clone, Debug, PartialEq)]
pub struct UploadConfig {
    /// Number of pending photos processed per sequential batch
    pub chunk_size: usize,
    /// Maximum simultaneous in-flight uploads within a batch
    pub concurrency: usize,
    /// Total attempts per photo, including the first one
    pub max_attempts: u32,
    /// Linear backoff unit: retry k waits `retry_base_delay_ms * k`
    pub retry_base_delay_ms: u64,
    /// Per-request transport timeout
    pub request_timeout_secs: u64,
    /// Empty an order's photo list once every photo is done and the server
    /// acknowledged the completion notification
    pub clear_completed_orders: bool,
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            concurrency: CONCURRENCY,
            max_attempts: MAX_ATTEMPTS,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            clear_completed_orders: false,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_extensions: split_list(ALLOWED_EXTENSIONS),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Missing or
    /// unparsable numeric values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_file_size_mb = lookup("UPLOAD_MAX_FILE_SIZE_MB")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(MAX_FILE_SIZE_MB);
        let max_file_size_bytes = max_file_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("UPLOAD_MAX_FILE_SIZE_MB is too large"))?;

        let config = Self {
            chunk_size: lookup("UPLOAD_CHUNK_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(CHUNK_SIZE),
            concurrency: lookup("UPLOAD_CONCURRENCY")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(CONCURRENCY),
            max_attempts: lookup("UPLOAD_MAX_ATTEMPTS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(MAX_ATTEMPTS),
            retry_base_delay_ms: lookup("UPLOAD_RETRY_BASE_DELAY_MS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(RETRY_BASE_DELAY_MS),
            request_timeout_secs: lookup("UPLOAD_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            clear_completed_orders: lookup("UPLOAD_CLEAR_COMPLETED_ORDERS")
                .unwrap_or_else(|| "false".to_string())
                .trim()
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            max_file_size_bytes,
            allowed_extensions: split_list(
                &lookup("UPLOAD_ALLOWED_EXTENSIONS")
                    .unwrap_or_else(|| ALLOWED_EXTENSIONS.to_string()),
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.chunk_size == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CHUNK_SIZE must be at least 1"));
        }

        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CONCURRENCY must be at least 1"));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_ATTEMPTS must be at least 1"));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_REQUEST_TIMEOUT_SECS must be at least 1"
            ));
        }

        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "UPLOAD_ALLOWED_EXTENSIONS must list at least one extension"
            ));
        }

        Ok(())
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
