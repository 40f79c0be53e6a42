//! Photo upload batch runner
//!
//! Uploads an order's pending photos in sequential chunks. Within a chunk the
//! jobs run under the concurrency limiter, and each job is an upload task
//! wrapped in the retry policy. Per-photo outcomes are reported to an
//! [`UploadObserver`]; counts accumulate into [`UploadStats`] across chunks.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use lumio_core::{
    Notification, PhotoStatus, UploadConfig, UploadError, UploadPhoto, UploadResult, UploadStats,
};

use crate::collaborators::{CompletionNotifier, NotificationSink, UploadForm, UploadTransport};
use crate::limiter::run_limited;
use crate::registry::AbortRegistry;
use crate::retry::RetryPolicy;
use crate::store::OrderUploadStore;
use crate::task::UploadTask;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub chunk_size: usize,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

impl BatchConfig {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            concurrency: config.concurrency,
            retry: RetryPolicy::from_config(config),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Receives per-photo outcomes from the batch runner.
pub trait UploadObserver: Send + Sync {
    /// An attempt is about to start. Returning false skips the photo, which
    /// is then reported as cancelled.
    fn on_attempt(&self, order_id: &str, uid: &str, attempt: u32) -> bool;
    fn on_progress(&self, order_id: &str, uid: &str, percent: u8);
    fn on_success(&self, order_id: &str, uid: &str);
    fn on_error(&self, order_id: &str, uid: &str, error: &UploadError);
    fn on_cancel(&self, order_id: &str, uid: &str);
}

/// Applies batch outcomes to the order store.
#[derive(Clone)]
pub struct StoreObserver {
    store: Arc<OrderUploadStore>,
}

impl StoreObserver {
    pub fn new(store: Arc<OrderUploadStore>) -> Self {
        Self { store }
    }
}

impl UploadObserver for StoreObserver {
    fn on_attempt(&self, order_id: &str, uid: &str, _attempt: u32) -> bool {
        self.store.mark_photo_uploading(order_id, uid).is_some()
    }

    fn on_progress(&self, order_id: &str, uid: &str, percent: u8) {
        self.store.update_photo_progress(order_id, uid, percent);
    }

    fn on_success(&self, order_id: &str, uid: &str) {
        self.store.update_photo_success(order_id, uid);
    }

    fn on_error(&self, order_id: &str, uid: &str, error: &UploadError) {
        self.store
            .update_photo_error(order_id, uid, &error.to_string());
    }

    fn on_cancel(&self, order_id: &str, uid: &str) {
        self.store.update_photo_cancel(order_id, uid);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Completed,
    Canceled,
}

#[derive(Clone)]
pub struct BatchRunner {
    transport: Arc<dyn UploadTransport>,
    notifier: Arc<dyn CompletionNotifier>,
    notifications: Arc<dyn NotificationSink>,
    registry: AbortRegistry,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        notifier: Arc<dyn CompletionNotifier>,
        notifications: Arc<dyn NotificationSink>,
        registry: AbortRegistry,
        config: BatchConfig,
    ) -> Self {
        Self {
            transport,
            notifier,
            notifications,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &AbortRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Upload every Pending photo of `photos`.
    ///
    /// Chunks of `chunk_size` photos run strictly one after the other; a
    /// chunk starts only when every job of the previous one has settled.
    /// When nothing is pending this returns immediately without touching
    /// the network. Otherwise the completion notifier is called once if at
    /// least one photo was uploaded, and a summary notification is pushed.
    ///
    /// Photos are consumed chunk by chunk so each payload reference is
    /// dropped as soon as its job ends.
    #[tracing::instrument(skip(self, photos, observer), fields(photos = photos.len()))]
    pub async fn run(
        &self,
        order_id: &str,
        order_name: &str,
        photos: Vec<Arc<UploadPhoto>>,
        observer: Arc<dyn UploadObserver>,
    ) -> UploadResult<UploadStats> {
        let pending: Vec<Arc<UploadPhoto>> = photos
            .into_iter()
            .filter(|photo| photo.status == PhotoStatus::Pending && photo.has_payload())
            .collect();

        if pending.is_empty() {
            tracing::debug!("No pending photos, nothing to upload");
            return Ok(UploadStats::default());
        }

        let mut stats = UploadStats::new(pending.len());
        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = pending.len().div_ceil(chunk_size);

        tracing::info!(
            pending = stats.total,
            chunk_size,
            chunks = chunk_count,
            concurrency = self.config.concurrency,
            "Starting order upload"
        );

        let mut remaining = pending.into_iter();
        for chunk_index in 0..chunk_count {
            let jobs: Vec<_> = remaining
                .by_ref()
                .take(chunk_size)
                .map(|photo| {
                    let observer = observer.clone();
                    move || self.upload_one(order_id, photo, observer)
                })
                .collect();

            let report = run_limited(jobs, self.config.concurrency).await;
            let mut chunk_canceled = 0;
            for outcome in &report.outcomes {
                match outcome {
                    Ok(JobOutcome::Completed) => stats.completed += 1,
                    Ok(JobOutcome::Canceled) => {
                        stats.canceled += 1;
                        chunk_canceled += 1;
                    }
                    Err(_) => stats.failed += 1,
                }
            }

            tracing::debug!(
                chunk = chunk_index + 1,
                chunks = chunk_count,
                uploaded = report.completed - chunk_canceled,
                failed = report.failed,
                canceled = chunk_canceled,
                "Chunk settled"
            );
        }

        self.finish(order_id, order_name, stats).await
    }

    /// One photo: register the job token, retry the upload task, report the
    /// final outcome, unregister.
    async fn upload_one(
        &self,
        order_id: &str,
        photo: Arc<UploadPhoto>,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<JobOutcome, UploadError> {
        let uid = photo.uid.clone();
        let payload = photo
            .file
            .clone()
            .ok_or_else(|| UploadError::Internal(format!("Photo {} has no payload", uid)))?;
        let form = UploadForm {
            uid: uid.clone(),
            file_name: photo.name.clone(),
            content_type: photo.content_type.clone(),
            payload,
        };
        drop(photo);

        let job_token = CancellationToken::new();
        let generation = self
            .registry
            .register(order_id, &uid, job_token.clone())
            .await;

        let result = self
            .config
            .retry
            .run(&job_token, |attempt| {
                let form = form.clone();
                let observer = observer.clone();
                let attempt_token = job_token.child_token();
                async move {
                    if !observer.on_attempt(order_id, &form.uid, attempt) {
                        tracing::debug!(uid = %form.uid, "Photo no longer pending, skipping");
                        return Err(UploadError::Canceled);
                    }

                    let progress_order = order_id.to_string();
                    let progress_uid = form.uid.clone();
                    UploadTask::new(
                        self.transport.clone(),
                        order_id,
                        form,
                        self.config.request_timeout,
                    )
                    .with_cancel_token(attempt_token)
                    .on_progress(move |percent| {
                        observer.on_progress(&progress_order, &progress_uid, percent)
                    })
                    .start()
                    .await
                }
            })
            .await;

        self.registry.unregister(&uid, generation).await;

        match result {
            Ok(()) => {
                observer.on_success(order_id, &uid);
                tracing::info!(uid = %uid, "Photo uploaded");
                Ok(JobOutcome::Completed)
            }
            Err(e) if e.is_cancelled() => {
                observer.on_cancel(order_id, &uid);
                tracing::info!(uid = %uid, "Photo upload canceled");
                Ok(JobOutcome::Canceled)
            }
            Err(e) => {
                observer.on_error(order_id, &uid, &e);
                tracing::error!(
                    uid = %uid,
                    error = %e,
                    error_code = e.error_code(),
                    "Photo upload failed"
                );
                Err(e)
            }
        }
    }

    async fn finish(
        &self,
        order_id: &str,
        order_name: &str,
        stats: UploadStats,
    ) -> UploadResult<UploadStats> {
        tracing::info!(
            total = stats.total,
            completed = stats.completed,
            failed = stats.failed,
            canceled = stats.canceled,
            "Order upload finished"
        );

        let mut notify_error = None;
        if stats.completed > 0 {
            if let Err(e) = self.notifier.notify_upload_complete(order_id).await {
                tracing::error!(error = %e, "Upload complete notification failed");
                notify_error = Some(e);
            }
        }

        self.notifications
            .add_notification(Notification::upload_summary(order_id, order_name, &stats));

        match notify_error {
            Some(source) => {
                self.notifications.add_notification(Notification::notify_failed(
                    order_id,
                    order_name,
                    &source.to_string(),
                ));
                Err(UploadError::Notify {
                    order_id: order_id.to_string(),
                    source,
                })
            }
            None => Ok(stats),
        }
    }
}
