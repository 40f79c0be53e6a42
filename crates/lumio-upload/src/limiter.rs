//! Bounded-parallelism job runner.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Outcome of a [`run_limited`] call. `outcomes` is in job order.
#[derive(Debug)]
pub struct LimiterReport<T, E> {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub outcomes: Vec<Result<T, E>>,
}

impl<T, E> LimiterReport<T, E> {
    pub fn is_settled(&self) -> bool {
        self.completed + self.failed == self.total
    }
}

/// Run `jobs` keeping at most `limit` of them in flight.
///
/// Jobs are launched in order. As soon as one settles, the next unstarted job
/// is launched. A failing job only increments `failed`; its siblings keep
/// running. Resolves once every job has settled. A `limit` of 0 is treated
/// as 1.
pub async fn run_limited<T, E, F, Fut>(jobs: Vec<F>, limit: usize) -> LimiterReport<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let total = jobs.len();
    let limit = limit.max(1);

    let mut outcomes: Vec<Option<Result<T, E>>> = (0..total).map(|_| None).collect();
    let mut unstarted = jobs.into_iter().enumerate();
    let mut active = FuturesUnordered::new();
    let mut completed = 0;
    let mut failed = 0;

    loop {
        while active.len() < limit {
            match unstarted.next() {
                Some((index, job)) => {
                    let fut = job();
                    active.push(async move { (index, fut.await) });
                }
                None => break,
            }
        }

        match active.next().await {
            Some((index, outcome)) => {
                if outcome.is_ok() {
                    completed += 1;
                } else {
                    failed += 1;
                }
                outcomes[index] = Some(outcome);
            }
            None => break,
        }
    }

    LimiterReport {
        total,
        completed,
        failed,
        outcomes: outcomes.into_iter().flatten().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    type BoxedJob = Pin<Box<dyn Future<Output = Result<usize, String>> + Send>>;

    fn timed_jobs(
        gauge: &Arc<Gauge>,
        delays_ms: &[u64],
        fail_every: usize,
    ) -> Vec<impl FnOnce() -> BoxedJob> {
        delays_ms
            .iter()
            .enumerate()
            .map(|(i, delay)| {
                let gauge = gauge.clone();
                let delay = *delay;
                move || {
                    Box::pin(async move {
                        gauge.enter();
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        gauge.exit();
                        if fail_every > 0 && i % fail_every == 0 {
                            Err(format!("job {} failed", i))
                        } else {
                            Ok(i)
                        }
                    }) as BoxedJob
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_jobs_resolve_immediately() {
        let jobs: Vec<fn() -> std::future::Ready<Result<(), ()>>> = Vec::new();
        let report = run_limited(jobs, 3).await;
        assert_eq!(report.total, 0);
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 0);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_limit() {
        for limit in 1..=4 {
            for count in [0usize, 1, 3, 7, 12] {
                let gauge = Arc::new(Gauge::default());
                let delays: Vec<u64> = (0..count).map(|i| 5 + (i as u64 * 7) % 13).collect();
                let report = run_limited(timed_jobs(&gauge, &delays, 0), limit).await;

                assert!(gauge.peak.load(Ordering::SeqCst) <= limit);
                assert_eq!(report.completed + report.failed, count);
                assert!(report.is_settled());
                if count >= limit {
                    assert_eq!(gauge.peak.load(Ordering::SeqCst), limit);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_siblings() {
        let gauge = Arc::new(Gauge::default());
        let report = run_limited(timed_jobs(&gauge, &[10, 20, 30, 40, 50, 60], 3), 2).await;

        assert_eq!(report.total, 6);
        assert_eq!(report.failed, 2);
        assert_eq!(report.completed, 4);
        assert_eq!(report.outcomes[0], Err("job 0 failed".to_string()));
        assert_eq!(report.outcomes[1], Ok(1));
        assert_eq!(report.outcomes[3], Err("job 3 failed".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn freed_slot_is_refilled_immediately() {
        // Job 0 is slow; jobs 1 to 3 are fast and must all run in the second slot
        // while job 0 is still in flight.
        let started = Arc::new(std::sync::Mutex::new(Vec::new()));
        let jobs: Vec<_> = [100u64, 10, 10, 10]
            .into_iter()
            .enumerate()
            .map(|(i, delay)| {
                let started = started.clone();
                move || async move {
                    started
                        .lock()
                        .unwrap()
                        .push((i, tokio::time::Instant::now()));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok::<_, ()>(i)
                }
            })
            .collect();

        let begin = tokio::time::Instant::now();
        let report = run_limited(jobs, 2).await;
        assert_eq!(report.completed, 4);

        let started = started.lock().unwrap();
        let last_start = started.iter().find(|(i, _)| *i == 3).unwrap().1;
        assert!(last_start - begin < Duration::from_millis(100));
    }
}
