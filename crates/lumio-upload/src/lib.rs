//! Lumio Upload
//!
//! Client-side orchestration of per-order photo uploads: single-attempt
//! upload tasks, a concurrency limiter, a linear-backoff retry policy, the
//! chunked batch runner, the order upload store and the cross-order
//! scheduler that runs one order at a time.

pub mod batch;
pub mod collaborators;
pub mod limiter;
pub mod manager;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod subscription;
pub mod task;

pub use batch::{BatchConfig, BatchRunner, StoreObserver, UploadObserver};
pub use collaborators::{
    CompletionNotifier, NotificationSink, ProgressFn, TracingNotificationSink, UploadForm,
    UploadOptions, UploadTransport,
};
pub use limiter::{run_limited, LimiterReport};
pub use manager::{EnqueueReport, UploadManager};
pub use registry::AbortRegistry;
pub use retry::RetryPolicy;
pub use scheduler::{Scheduler, SchedulerState};
pub use store::{OrderUploadStore, UploadState};
pub use subscription::Subscription;
pub use task::{progress_percent, UploadTask};
