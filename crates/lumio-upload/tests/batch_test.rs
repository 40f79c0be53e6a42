mod helpers;

use std::time::Duration;

use helpers::{harness, photos, position, test_config, Behavior, Event};
use lumio_core::{NotificationKind, OrderStatus, PhotoStatus};

/// Five photos, chunk size 4, concurrency 2: two sequential chunks, never
/// more than two uploads in flight, every payload released.
#[tokio::test(start_paused = true)]
async fn test_five_photo_order_runs_in_two_chunks() {
    let h = harness(test_config());
    let report = h.manager.upload_files(
        "order-1",
        "#1001",
        photos(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]),
    );
    assert_eq!(report.accepted.len(), 5);

    h.manager.wait_idle().await;

    assert_eq!(h.transport.call_count(), 5);
    assert_eq!(h.transport.peak_in_flight(), 2);

    // e.jpg belongs to the second chunk and starts only after the first
    // chunk has fully settled
    let events = h.transport.events();
    let second_chunk_start = position(&events, &Event::Start("e.jpg".to_string()));
    for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
        assert!(position(&events, &Event::End(name.to_string())) < second_chunk_start);
    }

    let queue = h.manager.store().get_order("order-1").unwrap();
    assert_eq!(queue.status, OrderStatus::Done);
    assert_eq!(queue.progress, 100);
    for photo in &queue.photos {
        assert_eq!(photo.status, PhotoStatus::Done);
        assert_eq!(photo.progress, 100);
        assert_eq!(photo.retry_count, 1);
        assert!(!photo.has_payload());
    }

    assert_eq!(h.notifier.calls(), vec!["order-1".to_string()]);
    let notes = h.sink.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Success);
    assert_eq!(notes[0].key, "upload-order-1");
    assert_eq!(notes[0].description, "5 of 5 photos uploaded, 0 failed");
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_photo_is_attempted_exactly_max_attempts() {
    let h = harness(test_config());
    h.transport.set_behavior("bad.jpg", Behavior::FailAlways);
    h.manager
        .upload_files("order-1", "#1001", photos(&["good.jpg", "bad.jpg"]));

    h.manager.wait_idle().await;

    assert_eq!(h.transport.calls_for("bad.jpg"), 3);
    assert_eq!(h.transport.calls_for("good.jpg"), 1);

    let queue = h.manager.store().get_order("order-1").unwrap();
    let bad = queue.photos.iter().find(|p| p.name == "bad.jpg").unwrap();
    assert_eq!(bad.status, PhotoStatus::Error);
    assert_eq!(bad.retry_count, 3);
    assert!(bad.has_payload());
    assert!(bad
        .error_msg
        .as_deref()
        .unwrap()
        .contains("Max retries exceeded after 3 attempts"));

    assert_eq!(queue.status, OrderStatus::Incomplete);
    assert_eq!(queue.progress, 50);

    assert_eq!(h.notifier.calls().len(), 1);
    let notes = h.sink.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Warning);
    assert_eq!(notes[0].description, "1 of 2 photos uploaded, 1 failed");
}

#[tokio::test(start_paused = true)]
async fn test_rejected_photo_uses_every_attempt() {
    let h = harness(test_config());
    h.transport.set_behavior("rejected.jpg", Behavior::Reject(400));
    let report = h
        .manager
        .upload_files("order-1", "#1001", photos(&["rejected.jpg"]));
    let uid = report.accepted[0].clone();

    h.manager.wait_idle().await;

    assert_eq!(h.transport.calls_for("rejected.jpg"), 3);
    let photo = h.manager.store().get_photo("order-1", &uid).unwrap();
    assert_eq!(photo.status, PhotoStatus::Error);
    assert_eq!(photo.retry_count, 3);
    let message = photo.error_msg.as_deref().unwrap();
    assert!(message.contains("Max retries exceeded after 3 attempts"));
    assert!(message.contains("status 400"));
    assert!(h.notifier.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover_within_attempt_budget() {
    let h = harness(test_config());
    h.transport.set_behavior("flaky.jpg", Behavior::FailTimes(2));
    h.manager
        .upload_files("order-1", "#1001", photos(&["flaky.jpg"]));

    h.manager.wait_idle().await;

    assert_eq!(h.transport.calls_for("flaky.jpg"), 3);
    let photo = &h.manager.store().get_upload_photos_by_order_id("order-1")[0];
    assert_eq!(photo.status, PhotoStatus::Done);
    assert_eq!(photo.retry_count, 3);
    assert_eq!(h.sink.notifications()[0].kind, NotificationKind::Success);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_upload_aborts_without_retry() {
    let h = harness(test_config());
    h.transport.set_behavior("slow.jpg", Behavior::Hang);
    let report = h
        .manager
        .upload_files("order-1", "#1001", photos(&["slow.jpg"]));
    let uid = report.accepted[0].clone();

    tokio::time::sleep(Duration::from_millis(80)).await;
    let photo = h.manager.store().get_photo("order-1", &uid).unwrap();
    assert_eq!(photo.status, PhotoStatus::Uploading);
    assert_eq!(photo.progress, 50);
    assert!(h.manager.registry().contains(&uid).await);

    assert!(h.manager.cancel_photo(&uid).await);
    h.manager.wait_idle().await;

    let photo = h.manager.store().get_photo("order-1", &uid).unwrap();
    assert_eq!(photo.status, PhotoStatus::Abort);
    assert!(photo.has_payload());
    assert_eq!(h.transport.calls_for("slow.jpg"), 1);
    assert!(h.manager.registry().is_empty().await);

    // nothing uploaded, so the server is not told the order is complete
    assert!(h.notifier.calls().is_empty());
    let notes = h.sink.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Info);
    assert_eq!(
        notes[0].description,
        "0 of 1 photos uploaded, 0 failed, 1 canceled"
    );

    // idle photo: cancel is a no-op
    assert!(!h.manager.cancel_photo(&uid).await);
}

#[tokio::test(start_paused = true)]
async fn test_rerun_of_finished_order_makes_no_network_calls() {
    let h = harness(test_config());
    h.manager
        .upload_files("order-1", "#1001", photos(&["a.jpg", "b.jpg"]));
    h.manager.wait_idle().await;
    assert_eq!(h.transport.call_count(), 2);

    h.manager.start_order("order-1");
    h.manager.wait_idle().await;

    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.notifier.calls().len(), 1);
    assert_eq!(h.sink.notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_chunks_never_overlap_with_larger_batches() {
    let mut config = test_config();
    config.chunk_size = 3;
    config.concurrency = 3;
    let h = harness(config);

    let names: Vec<String> = (0..7).map(|i| format!("{}.jpg", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    h.manager.upload_files("order-1", "#1001", photos(&name_refs));
    h.manager.wait_idle().await;

    assert_eq!(h.transport.call_count(), 7);
    assert!(h.transport.peak_in_flight() <= 3);

    let events = h.transport.events();
    for (chunk, next_first) in [(0..3, "3.jpg"), (3..6, "6.jpg")] {
        let next_start = position(&events, &Event::Start(next_first.to_string()));
        for i in chunk {
            assert!(position(&events, &Event::End(format!("{}.jpg", i))) < next_start);
        }
    }
}

#[tokio::test]
async fn test_invalid_files_are_rejected_before_enqueue() {
    let h = harness(test_config());
    let report = h.manager.enqueue_files(
        "order-1",
        "#1001",
        vec![
            helpers::photo("ok.png"),
            helpers::photo("notes.pdf"),
            lumio_core::PhotoFile::new("empty.jpg", Vec::new()),
        ],
    );

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.rejected[0].0, "notes.pdf");
    assert!(report.rejected.iter().all(|(_, e)| e.is_validation()));
    assert_eq!(
        h.manager.store().get_upload_photos_by_order_id("order-1").len(),
        1
    );
}
