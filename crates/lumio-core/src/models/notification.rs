use serde::{Deserialize, Serialize};

use super::stats::UploadStats;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

/// User-facing notification. Consumers treat `key` as an idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub description: String,
}

impl Notification {
    /// End-of-batch summary for an order.
    pub fn upload_summary(order_id: &str, order_name: &str, stats: &UploadStats) -> Self {
        let kind = if stats.failed > 0 {
            if stats.completed > 0 {
                NotificationKind::Warning
            } else {
                NotificationKind::Error
            }
        } else if stats.canceled > 0 {
            NotificationKind::Info
        } else {
            NotificationKind::Success
        };

        let mut description = format!(
            "{} of {} photos uploaded, {} failed",
            stats.completed, stats.total, stats.failed
        );
        if stats.canceled > 0 {
            description.push_str(&format!(", {} canceled", stats.canceled));
        }

        Self {
            key: format!("upload-{}", order_id),
            kind,
            message: format!("Upload finished for order {}", order_name),
            description,
        }
    }

    pub fn notify_failed(order_id: &str, order_name: &str, reason: &str) -> Self {
        Self {
            key: format!("upload-complete-failed-{}", order_id),
            kind: NotificationKind::Error,
            message: format!("Could not finalize upload for order {}", order_name),
            description: reason.to_string(),
        }
    }
}
