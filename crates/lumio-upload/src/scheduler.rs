//! Cross-order scheduler
//!
//! At most one order uploads at a time. Other orders wait in a FIFO queue and
//! start when the active run finishes, whatever its outcome.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

use lumio_core::{PhotoStatus, UploadError};

use crate::batch::{BatchRunner, StoreObserver, UploadObserver};
use crate::store::OrderUploadStore;
use crate::subscription::Subscription;

/// `active` is set exactly while a batch run executes for that order.
/// `pending` never contains `active` and never holds duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    pub active: Option<String>,
    pub pending: VecDeque<String>,
}

impl SchedulerState {
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.active.as_deref() == Some(order_id) || self.pending.iter().any(|id| id == order_id)
    }
}

struct SchedulerInner {
    state: watch::Sender<SchedulerState>,
    store: Arc<OrderUploadStore>,
    runner: BatchRunner,
    clear_completed_orders: bool,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        store: Arc<OrderUploadStore>,
        runner: BatchRunner,
        clear_completed_orders: bool,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::default());
        Self {
            inner: Arc::new(SchedulerInner {
                state,
                store,
                runner,
                clear_completed_orders,
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe<T, F>(&self, selector: F) -> Subscription<SchedulerState, T>
    where
        T: Clone + PartialEq,
        F: Fn(&SchedulerState) -> T + Send + Sync + 'static,
    {
        Subscription::new(self.inner.state.subscribe(), Box::new(selector))
    }

    pub fn is_active(&self, order_id: &str) -> bool {
        self.inner.state.borrow().active.as_deref() == Some(order_id)
    }

    /// Request an upload run for `order_id`.
    ///
    /// Starts it right away when nothing is running, otherwise queues it.
    /// A no-op when the order is already active or queued.
    pub fn start_order_queue(&self, order_id: &str) {
        let mut start = false;
        let modified = self.inner.state.send_if_modified(|state| {
            if state.contains(order_id) {
                return false;
            }
            if state.active.is_none() {
                state.active = Some(order_id.to_string());
                start = true;
            } else {
                state.pending.push_back(order_id.to_string());
            }
            true
        });

        if start {
            self.spawn_run(order_id.to_string());
        } else if modified {
            tracing::info!(order_id = %order_id, "Order queued for upload");
        } else {
            tracing::debug!(order_id = %order_id, "Order already scheduled");
        }
    }

    /// Move on to the next queued order, or go idle. `follow_up` re-queues
    /// the finished order behind every other waiting order.
    pub(crate) fn start_next_order_upload(&self, follow_up: Option<&str>) {
        let mut next = None;
        self.inner.state.send_modify(|state| {
            if let Some(order_id) = follow_up {
                if !state.pending.iter().any(|id| id == order_id) {
                    state.pending.push_back(order_id.to_string());
                }
            }
            state.active = state.pending.pop_front();
            next = state.active.clone();
        });

        match next {
            Some(order_id) => self.spawn_run(order_id),
            None => tracing::info!("Upload scheduler idle"),
        }
    }

    /// Resolves once no order is active or queued.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(SchedulerState::is_idle).await;
    }

    fn spawn_run(&self, order_id: String) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let run = tokio::spawn({
                let scheduler = scheduler.clone();
                let order_id = order_id.clone();
                async move { scheduler.run_order(&order_id).await }
            });

            if let Err(e) = run.await {
                tracing::error!(order_id = %order_id, error = %e, "Order upload run aborted");
            }

            let follow_up = scheduler.has_pending_photos(&order_id);
            if follow_up {
                tracing::info!(
                    order_id = %order_id,
                    "Order has new pending photos, queueing follow-up run"
                );
            }
            scheduler.start_next_order_upload(follow_up.then_some(order_id.as_str()));
        });
    }

    #[tracing::instrument(skip(self))]
    async fn run_order(&self, order_id: &str) {
        let Some(queue) = self.inner.store.get_order(order_id) else {
            tracing::warn!("Order has no upload queue");
            return;
        };
        let order_name = queue.order_name.clone();
        let photos = queue.photos.clone();
        drop(queue);

        let observer: Arc<dyn UploadObserver> =
            Arc::new(StoreObserver::new(self.inner.store.clone()));

        match self
            .inner
            .runner
            .run(order_id, &order_name, photos, observer)
            .await
        {
            Ok(stats) => {
                if self.inner.clear_completed_orders && stats.completed > 0 && stats.is_clean() {
                    self.clear_if_all_done(order_id);
                }
            }
            Err(e @ UploadError::Notify { .. }) => {
                tracing::error!(
                    error = %e.detailed_message(),
                    "Order uploaded but completion was not acknowledged"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    error_code = e.error_code(),
                    "Order upload run failed"
                );
            }
        }
    }

    fn clear_if_all_done(&self, order_id: &str) {
        let Some(queue) = self.inner.store.get_order(order_id) else {
            return;
        };
        if !queue.is_empty() && queue.count(PhotoStatus::Done) == queue.photos.len() {
            self.inner.store.clear_order(order_id);
            tracing::info!(order_id = %order_id, "Cleared completed order");
        }
    }

    /// Photos added or reset while the order was running are still Pending.
    fn has_pending_photos(&self, order_id: &str) -> bool {
        self.inner
            .store
            .get_upload_photos_by_order_id(order_id)
            .iter()
            .any(|p| p.status == PhotoStatus::Pending && p.has_payload())
    }
}
