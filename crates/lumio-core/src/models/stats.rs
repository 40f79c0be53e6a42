use serde::{Deserialize, Serialize};

/// Aggregate outcome of one batch run.
///
/// Cancellations are tracked on their own and never count as failures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl UploadStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn settled(&self) -> usize {
        self.completed + self.failed + self.canceled
    }

    pub fn is_complete(&self) -> bool {
        self.settled() >= self.total
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.canceled == 0
    }
}
