//! Single-file upload task.
//!
//! An [`UploadTask`] performs exactly one transport attempt. It owns its
//! cancellation token, enforces the per-request timeout, and reports through
//! callbacks registered before [`UploadTask::start`]. It never touches shared
//! state; callers wire the callbacks into the order store.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use lumio_core::UploadError;

use crate::collaborators::{UploadForm, UploadOptions, UploadTransport};

type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;
type CompleteCallback = Box<dyn FnOnce() + Send>;
type ErrorCallback = Box<dyn FnOnce(&UploadError) + Send>;

/// `floor(sent / total * 100)`, capped at 100. An empty body counts as done.
pub fn progress_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (sent.min(total) as u128 * 100) / total as u128;
    percent as u8
}

pub struct UploadTask {
    transport: Arc<dyn UploadTransport>,
    order_id: String,
    form: UploadForm,
    timeout: Duration,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
}

impl UploadTask {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        order_id: impl Into<String>,
        form: UploadForm,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            order_id: order_id.into(),
            form,
            timeout,
            cancel: CancellationToken::new(),
            on_progress: None,
            on_complete: None,
            on_error: None,
        }
    }

    /// Use an externally created token, typically a child of the photo's
    /// job-wide token so that one cancel covers every attempt.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(&UploadError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn uid(&self) -> &str {
        &self.form.uid
    }

    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the single upload attempt.
    ///
    /// Resolves with [`UploadError::Canceled`] if the token fires before or
    /// during the request, and with [`UploadError::Timeout`] if the transport
    /// does not settle within the configured timeout.
    pub async fn start(self) -> Result<(), UploadError> {
        let UploadTask {
            transport,
            order_id,
            form,
            timeout,
            cancel,
            on_progress,
            on_complete,
            on_error,
        } = self;

        let last_percent = Arc::new(AtomicU8::new(0));
        let progress = {
            let last_percent = last_percent.clone();
            Arc::new(move |sent: u64, total: u64| {
                let percent = progress_percent(sent, total);
                let previous = last_percent.fetch_max(percent, Ordering::SeqCst);
                if percent > previous {
                    if let Some(callback) = on_progress.as_ref() {
                        callback(percent);
                    }
                }
            })
        };

        let options = UploadOptions {
            timeout,
            progress,
            cancel: cancel.clone(),
        };

        let result = if cancel.is_cancelled() {
            Err(UploadError::Canceled)
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(UploadError::Canceled),
                outcome = tokio::time::timeout(timeout, transport.upload_photo(&order_id, form, options)) => {
                    match outcome {
                        Ok(result) => result,
                        Err(_) => Err(UploadError::Timeout(timeout)),
                    }
                }
            }
        };

        // A transport that noticed the abort first may report it as a
        // connection error.
        let result = match result {
            Err(_) if cancel.is_cancelled() => Err(UploadError::Canceled),
            other => other,
        };

        match &result {
            Ok(()) => {
                if let Some(callback) = on_complete {
                    callback();
                }
            }
            Err(err) => {
                if let Some(callback) = on_error {
                    callback(err);
                }
            }
        }

        result
    }
}
