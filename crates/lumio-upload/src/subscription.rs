//! Selector-projected change streams over a `watch` channel.

use tokio::sync::watch;

type Selector<S, T> = Box<dyn Fn(&S) -> T + Send + Sync>;

/// Yields the projection of a shared state each time that projection changes.
///
/// Unrelated state changes are swallowed: [`Subscription::changed`] only
/// resolves once `selector(state)` differs from the last value it returned.
pub struct Subscription<S, T> {
    rx: watch::Receiver<S>,
    selector: Selector<S, T>,
    last: T,
}

impl<S, T> Subscription<S, T>
where
    T: Clone + PartialEq,
{
    pub(crate) fn new(mut rx: watch::Receiver<S>, selector: Selector<S, T>) -> Self {
        let last = selector(&rx.borrow_and_update());
        Self { rx, selector, last }
    }

    /// Projection of the current state, without marking it as seen.
    pub fn current(&self) -> T {
        (self.selector)(&self.rx.borrow())
    }

    /// The value most recently yielded (or the initial projection).
    pub fn last(&self) -> &T {
        &self.last
    }

    /// Wait for the projection to change. Returns `None` once the state
    /// owner has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let next = (self.selector)(&self.rx.borrow_and_update());
            if next != self.last {
                self.last = next.clone();
                return Some(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Counters {
        a: u32,
        b: u32,
    }

    #[tokio::test]
    async fn test_only_projected_changes_are_yielded() {
        let (tx, rx) = watch::channel(Counters::default());
        let mut sub = Subscription::new(rx, Box::new(|s: &Counters| s.a));
        assert_eq!(*sub.last(), 0);

        tx.send_modify(|s| s.b += 1);
        tx.send_modify(|s| s.a = 7);

        assert_eq!(sub.changed().await, Some(7));
        assert_eq!(sub.current(), 7);
    }

    #[tokio::test]
    async fn test_closed_sender_ends_stream() {
        let (tx, rx) = watch::channel(Counters::default());
        let mut sub = Subscription::new(rx, Box::new(|s: &Counters| s.b));
        drop(tx);
        assert_eq!(sub.changed().await, None);
    }
}
