//! Order upload store
//!
//! Holds every order's upload queue behind a `watch` channel. Each mutation
//! is a single read-modify-write inside `send_if_modified`, so it always sees
//! the latest state and publishes at most one new snapshot. Mutations replace
//! exactly one `Arc<OrderUploadQueue>` and the one `Arc<UploadPhoto>` they
//! touch. References to orders or photos that no longer exist are ignored.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use lumio_core::{
    OrderUploadQueue, PhotoFile, PhotoStatus, PhotoValidator, UploadConfig, UploadError,
    UploadPhoto, UploadResult,
};

use crate::subscription::Subscription;

/// Snapshot of every order's upload queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub orders: HashMap<String, Arc<OrderUploadQueue>>,
}

impl UploadState {
    pub fn order(&self, order_id: &str) -> Option<&Arc<OrderUploadQueue>> {
        self.orders.get(order_id)
    }
}

pub struct OrderUploadStore {
    state: watch::Sender<UploadState>,
    validator: PhotoValidator,
}

impl Default for OrderUploadStore {
    fn default() -> Self {
        Self::new(PhotoValidator::default())
    }
}

impl OrderUploadStore {
    pub fn new(validator: PhotoValidator) -> Self {
        let (state, _) = watch::channel(UploadState::default());
        Self { state, validator }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(PhotoValidator::from_config(config))
    }

    pub fn snapshot(&self) -> UploadState {
        self.state.borrow().clone()
    }

    pub fn subscribe<T, F>(&self, selector: F) -> Subscription<UploadState, T>
    where
        T: Clone + PartialEq,
        F: Fn(&UploadState) -> T + Send + Sync + 'static,
    {
        Subscription::new(self.state.subscribe(), Box::new(selector))
    }

    pub fn subscribe_order(
        &self,
        order_id: impl Into<String>,
    ) -> Subscription<UploadState, Option<Arc<OrderUploadQueue>>> {
        let order_id = order_id.into();
        self.subscribe(move |state| state.order(&order_id).cloned())
    }

    /// Validate `file` and append it to the order's queue as a Pending photo,
    /// creating the queue if needed. Returns the new photo's uid.
    #[tracing::instrument(skip(self, file), fields(file.name = %file.name, file.size = file.size()))]
    pub fn create_upload_order(
        &self,
        order_id: &str,
        order_name: &str,
        file: PhotoFile,
    ) -> UploadResult<String> {
        if order_id.trim().is_empty() {
            return Err(UploadError::InvalidInput(
                "Order id must not be empty".to_string(),
            ));
        }

        if let Err(e) = self.validator.validate(&file) {
            tracing::debug!(error = %e, "Rejected file before enqueue");
            return Err(e);
        }

        let photo = UploadPhoto::new(file);
        let uid = photo.uid.clone();

        self.state.send_modify(|state| {
            let mut queue = state
                .orders
                .get(order_id)
                .map(|queue| (**queue).clone())
                .unwrap_or_else(|| OrderUploadQueue::new(order_id, order_name));
            queue.photos.push(Arc::new(photo));
            queue.recompute_status();
            state.orders.insert(order_id.to_string(), Arc::new(queue));
        });

        tracing::debug!(uid = %uid, "Photo enqueued");
        Ok(uid)
    }

    pub fn get_upload_photos_by_order_id(&self, order_id: &str) -> Vec<Arc<UploadPhoto>> {
        self.state
            .borrow()
            .order(order_id)
            .map(|queue| queue.photos.clone())
            .unwrap_or_default()
    }

    pub fn get_order(&self, order_id: &str) -> Option<Arc<OrderUploadQueue>> {
        self.state.borrow().order(order_id).cloned()
    }

    pub fn get_photo(&self, order_id: &str, uid: &str) -> Option<Arc<UploadPhoto>> {
        self.state
            .borrow()
            .order(order_id)
            .and_then(|queue| queue.photo(uid).cloned())
    }

    /// Every order, sorted by id.
    pub fn list_orders(&self) -> Vec<Arc<OrderUploadQueue>> {
        let mut orders: Vec<_> = self.state.borrow().orders.values().cloned().collect();
        orders.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        orders
    }

    /// Start of an upload attempt: Uploading, progress reset, attempt counted.
    pub fn mark_photo_uploading(
        &self,
        order_id: &str,
        uid: &str,
    ) -> Option<Arc<OrderUploadQueue>> {
        self.update_photo(order_id, uid, "mark_uploading", false, |photo| {
            if !matches!(photo.status, PhotoStatus::Pending | PhotoStatus::Uploading) {
                return false;
            }
            photo.status = PhotoStatus::Uploading;
            photo.progress = 0;
            photo.retry_count += 1;
            photo.error_msg = None;
            true
        })
    }

    /// Per-attempt progress. Ignored unless the photo is Uploading and the
    /// value moves forward.
    pub fn update_photo_progress(
        &self,
        order_id: &str,
        uid: &str,
        progress: u8,
    ) -> Option<Arc<OrderUploadQueue>> {
        let progress = progress.min(100);
        self.update_photo(order_id, uid, "progress", false, |photo| {
            if photo.status != PhotoStatus::Uploading || progress <= photo.progress {
                return false;
            }
            photo.progress = progress;
            true
        })
    }

    /// Done: progress 100, payload released, order progress recomputed.
    pub fn update_photo_success(
        &self,
        order_id: &str,
        uid: &str,
    ) -> Option<Arc<OrderUploadQueue>> {
        self.update_photo(order_id, uid, "success", true, |photo| {
            if photo.status == PhotoStatus::Done {
                return false;
            }
            photo.status = PhotoStatus::Done;
            photo.progress = 100;
            photo.error_msg = None;
            photo.file = None;
            true
        })
    }

    pub fn update_photo_error(
        &self,
        order_id: &str,
        uid: &str,
        message: &str,
    ) -> Option<Arc<OrderUploadQueue>> {
        self.update_photo(order_id, uid, "error", false, |photo| {
            if !matches!(photo.status, PhotoStatus::Pending | PhotoStatus::Uploading) {
                return false;
            }
            photo.status = PhotoStatus::Error;
            photo.error_msg = Some(message.to_string());
            true
        })
    }

    pub fn update_photo_cancel(
        &self,
        order_id: &str,
        uid: &str,
    ) -> Option<Arc<OrderUploadQueue>> {
        self.update_photo(order_id, uid, "cancel", false, |photo| {
            if matches!(photo.status, PhotoStatus::Done | PhotoStatus::Abort) {
                return false;
            }
            photo.status = PhotoStatus::Abort;
            photo.error_msg = None;
            true
        })
    }

    /// Error or Abort back to Pending. `retry_count` is kept.
    pub fn reset_photo_for_retry(
        &self,
        order_id: &str,
        uid: &str,
    ) -> Option<Arc<OrderUploadQueue>> {
        self.update_photo(order_id, uid, "reset", false, |photo| {
            if !photo.status.can_retry() || !photo.has_payload() {
                return false;
            }
            photo.status = PhotoStatus::Pending;
            photo.progress = 0;
            photo.error_msg = None;
            true
        })
    }

    /// Remove one photo from its order. Photos that are Uploading must be
    /// cancelled first.
    pub fn remove_photo(
        &self,
        order_id: &str,
        uid: &str,
    ) -> UploadResult<Option<Arc<OrderUploadQueue>>> {
        let mut busy = false;
        let mut updated = None;

        self.state.send_if_modified(|state| {
            let Some(current) = state.orders.get(order_id) else {
                return false;
            };
            let Some(photo) = current.photo(uid) else {
                return false;
            };
            if photo.status == PhotoStatus::Uploading {
                busy = true;
                return false;
            }

            let mut queue = (**current).clone();
            queue.photos.retain(|p| p.uid != uid);
            queue.recompute_status();
            queue.recompute_progress();

            let queue = Arc::new(queue);
            state.orders.insert(order_id.to_string(), queue.clone());
            updated = Some(queue);
            true
        });

        if busy {
            return Err(UploadError::PhotoBusy(uid.to_string()));
        }
        if updated.is_none() {
            tracing::debug!(order_id = %order_id, uid = %uid, "Remove ignored for unknown photo");
        }
        Ok(updated)
    }

    /// Empty an order's photo list. In-flight jobs for it become stale and
    /// their later updates are ignored.
    pub fn clear_order(&self, order_id: &str) -> Option<Arc<OrderUploadQueue>> {
        let mut updated = None;
        self.state.send_if_modified(|state| {
            let Some(current) = state.orders.get(order_id) else {
                return false;
            };
            if current.is_empty() {
                return false;
            }

            let mut queue = (**current).clone();
            queue.photos.clear();
            queue.progress = 0;
            queue.recompute_status();

            let queue = Arc::new(queue);
            state.orders.insert(order_id.to_string(), queue.clone());
            updated = Some(queue);
            true
        });
        updated
    }

    fn update_photo<F>(
        &self,
        order_id: &str,
        uid: &str,
        op: &'static str,
        recompute_progress: bool,
        apply: F,
    ) -> Option<Arc<OrderUploadQueue>>
    where
        F: FnOnce(&mut UploadPhoto) -> bool,
    {
        let mut updated = None;
        let mut found = false;

        self.state.send_if_modified(|state| {
            let Some(current) = state.orders.get(order_id) else {
                return false;
            };
            if current.photo(uid).is_none() {
                return false;
            }
            found = true;

            let mut queue = (**current).clone();
            let changed = match queue.photo_mut(uid) {
                Some(photo) => apply(photo),
                None => false,
            };
            if !changed {
                return false;
            }

            queue.recompute_status();
            if recompute_progress {
                queue.recompute_progress();
            }

            let queue = Arc::new(queue);
            state.orders.insert(order_id.to_string(), queue.clone());
            updated = Some(queue);
            true
        });

        if !found {
            tracing::debug!(
                order_id = %order_id,
                uid = %uid,
                op,
                "Ignoring update for unknown order or photo"
            );
        }
        updated
    }
}
