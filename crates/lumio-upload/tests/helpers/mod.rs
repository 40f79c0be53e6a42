//! Test helpers: scripted transport, recording notifier and sink, and an
//! upload manager wired to them.
//!
//! Timing-sensitive tests run on a paused clock (`start_paused = true`); the
//! mock transport only ever waits on tokio timers or its cancellation token.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lumio_core::{Notification, PhotoFile, UploadConfig, UploadError};
use lumio_upload::{
    CompletionNotifier, NotificationSink, UploadForm, UploadManager, UploadOptions,
    UploadTransport,
};

/// Scripted outcome for one file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    /// Every attempt fails with a retryable network error.
    FailAlways,
    /// The first `n` attempts fail, later ones succeed.
    FailTimes(u32),
    /// Every attempt is answered with the given non-2xx status.
    Reject(u16),
    /// Never answers; only cancellation (or the request timeout) ends it.
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub order_id: String,
    pub file_name: String,
    pub uid: String,
}

pub struct MockTransport {
    transfer_time: Duration,
    behaviors: Mutex<HashMap<String, Behavior>>,
    attempts: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<Call>>,
    events: Mutex<Vec<Event>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTransport {
    pub fn new(transfer_time: Duration) -> Self {
        Self {
            transfer_time,
            behaviors: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, file_name: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(file_name.to_string(), behavior);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, file_name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.file_name == file_name)
            .count()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, file_name: &str) -> Behavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(file_name)
            .copied()
            .unwrap_or(Behavior::Succeed)
    }

    fn next_attempt(&self, file_name: &str) -> u32 {
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(file_name.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

struct InFlight<'a> {
    transport: &'a MockTransport,
    file_name: String,
}

impl<'a> InFlight<'a> {
    fn enter(transport: &'a MockTransport, file_name: &str) -> Self {
        let now = transport.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        transport.peak.fetch_max(now, Ordering::SeqCst);
        transport
            .events
            .lock()
            .unwrap()
            .push(Event::Start(file_name.to_string()));
        Self {
            transport,
            file_name: file_name.to_string(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.transport.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.transport
            .events
            .lock()
            .unwrap()
            .push(Event::End(self.file_name.clone()));
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    async fn upload_photo(
        &self,
        order_id: &str,
        form: UploadForm,
        options: UploadOptions,
    ) -> Result<(), UploadError> {
        self.calls.lock().unwrap().push(Call {
            order_id: order_id.to_string(),
            file_name: form.file_name.clone(),
            uid: form.uid.clone(),
        });
        let _in_flight = InFlight::enter(self, &form.file_name);

        let behavior = self.behavior_for(&form.file_name);
        let attempt = self.next_attempt(&form.file_name);
        let total = form.len();

        options.report_progress(0, total);
        let transfer = async {
            tokio::time::sleep(self.transfer_time / 2).await;
            options.report_progress(total / 2, total);
            if behavior == Behavior::Hang {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(self.transfer_time / 2).await;
        };

        tokio::select! {
            _ = options.cancel.cancelled() => return Err(UploadError::Canceled),
            _ = transfer => {}
        }

        match behavior {
            Behavior::Succeed | Behavior::Hang => {
                options.report_progress(total, total);
                Ok(())
            }
            Behavior::FailAlways => Err(UploadError::Network("connection reset".to_string())),
            Behavior::FailTimes(n) if attempt <= n => {
                Err(UploadError::Http {
                    status: 503,
                    message: "service unavailable".to_string(),
                })
            }
            Behavior::FailTimes(_) => {
                options.report_progress(total, total);
                Ok(())
            }
            Behavior::Reject(status) => Err(UploadError::Http {
                status,
                message: "bad".to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn notify_upload_complete(&self, order_id: &str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(order_id.to_string());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("upload-complete endpoint returned 502");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn add_notification(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

pub struct Harness {
    pub manager: UploadManager,
    pub transport: Arc<MockTransport>,
    pub notifier: Arc<RecordingNotifier>,
    pub sink: Arc<RecordingSink>,
}

/// Defaults with a short retry base delay so paused-clock runs stay readable.
pub fn test_config() -> UploadConfig {
    UploadConfig {
        retry_base_delay_ms: 100,
        ..UploadConfig::default()
    }
}

pub fn harness(config: UploadConfig) -> Harness {
    harness_with_notifier(config, RecordingNotifier::default())
}

pub fn harness_with_notifier(config: UploadConfig, notifier: RecordingNotifier) -> Harness {
    let transport = Arc::new(MockTransport::new(Duration::from_millis(100)));
    let notifier = Arc::new(notifier);
    let sink = Arc::new(RecordingSink::default());
    let manager = UploadManager::new(&config, transport.clone(), notifier.clone(), sink.clone());
    Harness {
        manager,
        transport,
        notifier,
        sink,
    }
}

pub fn photo(name: &str) -> PhotoFile {
    PhotoFile::new(name, vec![0xAB; 1024])
}

pub fn photos(names: &[&str]) -> Vec<PhotoFile> {
    names.iter().map(|name| photo(name)).collect()
}

pub fn position(events: &[Event], event: &Event) -> usize {
    events
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("event {:?} not recorded", event))
}
