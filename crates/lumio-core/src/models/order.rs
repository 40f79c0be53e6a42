use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use super::photo::{PhotoStatus, UploadPhoto};

/// Aggregate state of an order's upload queue, derived from its photos.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Uploading,
    Done,
    /// Every photo is terminal but at least one ended in Error or Abort.
    Incomplete,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Uploading => write!(f, "uploading"),
            OrderStatus::Done => write!(f, "done"),
            OrderStatus::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// Percentage of `done` over `total`, rounded half up. Zero when empty.
pub fn completion_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    ((done * 100 + total / 2) / total) as u8
}

/// One upload queue per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderUploadQueue {
    pub order_id: String,
    pub order_name: String,
    pub photos: Vec<Arc<UploadPhoto>>,
    pub status: OrderStatus,
    pub progress: u8,
}

impl OrderUploadQueue {
    pub fn new(order_id: impl Into<String>, order_name: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            order_name: order_name.into(),
            photos: Vec::new(),
            status: OrderStatus::Pending,
            progress: 0,
        }
    }

    pub fn photo(&self, uid: &str) -> Option<&Arc<UploadPhoto>> {
        self.photos.iter().find(|p| p.uid == uid)
    }

    /// Copy-on-write access to one photo: only that photo is cloned when a
    /// snapshot still shares it.
    pub fn photo_mut(&mut self, uid: &str) -> Option<&mut UploadPhoto> {
        self.photos
            .iter_mut()
            .find(|p| p.uid == uid)
            .map(Arc::make_mut)
    }

    pub fn count(&self, status: PhotoStatus) -> usize {
        self.photos.iter().filter(|p| p.status == status).count()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Re-derive `status` from the photos.
    pub fn recompute_status(&mut self) {
        self.status = if self.photos.is_empty() {
            OrderStatus::Pending
        } else if self.count(PhotoStatus::Uploading) > 0 {
            OrderStatus::Uploading
        } else if self.count(PhotoStatus::Pending) > 0 {
            OrderStatus::Pending
        } else if self.count(PhotoStatus::Done) == self.photos.len() {
            OrderStatus::Done
        } else {
            OrderStatus::Incomplete
        };
    }

    /// Re-derive `progress` as the share of Done photos. Only called when a
    /// photo becomes Done, so failures never lower it.
    pub fn recompute_progress(&mut self) {
        self.progress = completion_percent(self.count(PhotoStatus::Done), self.photos.len());
    }
}
