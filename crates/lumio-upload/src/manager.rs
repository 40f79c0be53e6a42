//! Upload manager
//!
//! Wires the store, abort registry, batch runner and scheduler together and
//! exposes the user-facing operations: enqueue, start, cancel, retry, remove
//! and clear.

use std::sync::Arc;

use lumio_core::{
    OrderUploadQueue, PhotoFile, PhotoStatus, UploadConfig, UploadError, UploadResult,
};

use crate::batch::{BatchConfig, BatchRunner};
use crate::collaborators::{CompletionNotifier, NotificationSink, UploadTransport};
use crate::registry::AbortRegistry;
use crate::scheduler::Scheduler;
use crate::store::OrderUploadStore;

/// Uids of the enqueued files and the names of rejected ones with the reason.
#[derive(Debug, Default)]
pub struct EnqueueReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<(String, UploadError)>,
}

impl EnqueueReport {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}

#[derive(Clone)]
pub struct UploadManager {
    store: Arc<OrderUploadStore>,
    registry: AbortRegistry,
    scheduler: Scheduler,
}

impl UploadManager {
    pub fn new(
        config: &UploadConfig,
        transport: Arc<dyn UploadTransport>,
        notifier: Arc<dyn CompletionNotifier>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let store = Arc::new(OrderUploadStore::from_config(config));
        let registry = AbortRegistry::new();
        let runner = BatchRunner::new(
            transport,
            notifier,
            notifications,
            registry.clone(),
            BatchConfig::from_config(config),
        );
        let scheduler = Scheduler::new(store.clone(), runner, config.clear_completed_orders);

        Self {
            store,
            registry,
            scheduler,
        }
    }

    pub fn store(&self) -> &Arc<OrderUploadStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &AbortRegistry {
        &self.registry
    }

    /// Validate and enqueue `files` as Pending photos of the order. Invalid
    /// files are reported and skipped; the rest are enqueued in order.
    pub fn enqueue_files(
        &self,
        order_id: &str,
        order_name: &str,
        files: impl IntoIterator<Item = PhotoFile>,
    ) -> EnqueueReport {
        let mut report = EnqueueReport::default();
        for file in files {
            let name = file.name.clone();
            match self.store.create_upload_order(order_id, order_name, file) {
                Ok(uid) => report.accepted.push(uid),
                Err(e) => {
                    tracing::warn!(order_id = %order_id, file = %name, error = %e, "File rejected");
                    report.rejected.push((name, e));
                }
            }
        }
        report
    }

    pub fn start_order(&self, order_id: &str) {
        self.scheduler.start_order_queue(order_id);
    }

    /// Enqueue and start in one call.
    pub fn upload_files(
        &self,
        order_id: &str,
        order_name: &str,
        files: impl IntoIterator<Item = PhotoFile>,
    ) -> EnqueueReport {
        let report = self.enqueue_files(order_id, order_name, files);
        if !report.accepted.is_empty() {
            self.start_order(order_id);
        }
        report
    }

    /// Abort the photo's running upload. Returns false when nothing is
    /// running for it.
    pub async fn cancel_photo(&self, uid: &str) -> bool {
        self.registry.cancel(uid).await
    }

    /// Abort every running upload of the order and mark its not yet started
    /// photos as Abort. Returns how many photos were affected.
    pub async fn cancel_order(&self, order_id: &str) -> usize {
        let running = self.registry.cancel_order(order_id).await;

        let mut waiting = 0;
        for photo in self.store.get_upload_photos_by_order_id(order_id) {
            if photo.status == PhotoStatus::Pending
                && self.store.update_photo_cancel(order_id, &photo.uid).is_some()
            {
                waiting += 1;
            }
        }

        running + waiting
    }

    /// Remove a photo, cancelling its upload first if one is running.
    pub async fn remove_photo(
        &self,
        order_id: &str,
        uid: &str,
    ) -> UploadResult<Option<Arc<OrderUploadQueue>>> {
        if self.registry.cancel(uid).await {
            self.store.update_photo_cancel(order_id, uid);
        }
        self.store.remove_photo(order_id, uid)
    }

    /// Reset one Error or Abort photo to Pending and schedule the order.
    pub fn retry_photo(&self, order_id: &str, uid: &str) -> UploadResult<()> {
        let photo = self
            .store
            .get_photo(order_id, uid)
            .ok_or_else(|| {
                UploadError::NotFound(format!("Photo {} in order {}", uid, order_id))
            })?;

        if !photo.status.can_retry() {
            return Err(UploadError::InvalidInput(format!(
                "Photo {} is {}, only failed or aborted photos can be retried",
                uid, photo.status
            )));
        }

        if self.store.reset_photo_for_retry(order_id, uid).is_some() {
            tracing::info!(order_id = %order_id, uid = %uid, "Photo queued for retry");
            self.scheduler.start_order_queue(order_id);
        }
        Ok(())
    }

    /// Reset every Error and Abort photo of the order and schedule it.
    /// Returns how many photos were reset.
    pub fn retry_failed(&self, order_id: &str) -> usize {
        let mut reset = 0;
        for photo in self.store.get_upload_photos_by_order_id(order_id) {
            if photo.status.can_retry()
                && self.store.reset_photo_for_retry(order_id, &photo.uid).is_some()
            {
                reset += 1;
            }
        }

        if reset > 0 {
            tracing::info!(order_id = %order_id, reset, "Failed photos queued for retry");
            self.scheduler.start_order_queue(order_id);
        }
        reset
    }

    /// Cancel the order's running uploads and empty its photo list.
    pub async fn clear_order(&self, order_id: &str) -> Option<Arc<OrderUploadQueue>> {
        self.registry.cancel_order(order_id).await;
        self.store.clear_order(order_id)
    }

    pub async fn wait_idle(&self) {
        self.scheduler.wait_idle().await;
    }
}
