//! External collaborator traits
//!
//! The orchestrator talks to the outside world only through these seams: the
//! upload transport (one multipart request per attempt), the completion
//! notifier (one call per finished order run) and the user notification sink.
//! The HTTP implementation lives in `lumio-api-client`.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use lumio_core::{Notification, NotificationKind, UploadError};

/// Progress callback: `(bytes_sent, bytes_total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Multipart form fields sent per upload request (`file` and `uid`).
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub uid: String,
    pub file_name: String,
    pub content_type: String,
    pub payload: Bytes,
}

impl UploadForm {
    pub fn len(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Per-request options handed to the transport.
#[derive(Clone)]
pub struct UploadOptions {
    pub timeout: Duration,
    pub progress: ProgressFn,
    pub cancel: CancellationToken,
}

impl UploadOptions {
    pub fn report_progress(&self, sent: u64, total: u64) {
        (self.progress)(sent, total)
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Performs one HTTP upload attempt.
///
/// Implementations must resolve with [`UploadError::Canceled`] when
/// `options.cancel` fires, and otherwise fail with an error whose
/// [`UploadError::is_retryable`] reflects whether another attempt may succeed.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload_photo(
        &self,
        order_id: &str,
        form: UploadForm,
        options: UploadOptions,
    ) -> Result<(), UploadError>;
}

/// Tells the server that an order's upload run finished, so it can start
/// post-processing.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify_upload_complete(&self, order_id: &str) -> anyhow::Result<()>;
}

/// Fire-and-forget user notifications.
pub trait NotificationSink: Send + Sync {
    fn add_notification(&self, notification: Notification);
}

/// Notification sink that writes to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn add_notification(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => tracing::error!(
                key = %notification.key,
                description = %notification.description,
                "{}",
                notification.message
            ),
            NotificationKind::Warning => tracing::warn!(
                key = %notification.key,
                description = %notification.description,
                "{}",
                notification.message
            ),
            NotificationKind::Success | NotificationKind::Info => tracing::info!(
                key = %notification.key,
                description = %notification.description,
                "{}",
                notification.message
            ),
        }
    }
}
