//! Passive browser-signal plumbing for handoff detection.
//!
//! The library cannot observe the OS protocol handler directly; all it gets
//! are the page-level side effects of an external app taking focus. The host
//! environment embedding this crate (a webview bridge in production, a test
//! harness here) forwards those as [`PageSignal`]s into a [`SignalBus`], and
//! the detector races one-shot waiters against its timeout.

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// A focus-loss signal observed by the page hosting the install surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    /// The page's visibility transitioned to hidden - the strongest
    /// available evidence that a foreground app swallowed the navigation.
    VisibilityHidden,
    /// The window lost focus without a visibility change. Weaker, some
    /// platforms route focus loss this way; treated as equally successful.
    WindowBlur,
}

struct WaiterEntry {
    predicate: Box<dyn Fn(&PageSignal) -> bool + Send + Sync>,
    complete_tx: oneshot::Sender<PageSignal>,
}

/// Dispatches page signals to predicate-matched one-shot waiters.
///
/// Waiters receive the first matching signal and are removed; entries whose
/// receiver has been dropped (a race that already resolved) are pruned on
/// the next [`emit`](Self::emit), so a finished detection leaves nothing
/// armed.
#[derive(Default)]
pub struct SignalBus {
    waiters: Mutex<Vec<WaiterEntry>>,
}

impl SignalBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a signal to every waiter whose predicate matches.
    ///
    /// Matching waiters are removed whether or not their receiver is still
    /// alive; dead non-matching waiters are dropped as well.
    pub fn emit(&self, signal: PageSignal) {
        let mut waiters = self.waiters.lock();
        let mut i = 0;
        while i < waiters.len() {
            if waiters[i].complete_tx.is_closed() {
                waiters.swap_remove(i);
            } else if (waiters[i].predicate)(&signal) {
                let entry = waiters.swap_remove(i);
                let _ = entry.complete_tx.send(signal);
            } else {
                i += 1;
            }
        }
    }

    /// Registers a waiter that completes on the first matching signal.
    pub fn register_waiter<F>(&self, predicate: F) -> oneshot::Receiver<PageSignal>
    where
        F: Fn(&PageSignal) -> bool + Send + Sync + 'static,
    {
        let (complete_tx, complete_rx) = oneshot::channel();
        self.waiters.lock().push(WaiterEntry {
            predicate: Box::new(predicate),
            complete_tx,
        });
        complete_rx
    }

    /// Number of currently armed waiters.
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("waiters", &self.waiter_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waiter_receives_matching_signal() {
        let bus = SignalBus::new();
        let rx = bus.register_waiter(|s| matches!(s, PageSignal::VisibilityHidden));

        bus.emit(PageSignal::VisibilityHidden);

        assert_eq!(rx.await.unwrap(), PageSignal::VisibilityHidden);
    }

    #[tokio::test]
    async fn waiter_ignores_non_matching_signal() {
        let bus = SignalBus::new();
        let mut rx = bus.register_waiter(|s| matches!(s, PageSignal::VisibilityHidden));

        bus.emit(PageSignal::WindowBlur);

        assert!(rx.try_recv().is_err());
        assert_eq!(bus.waiter_count(), 1);
    }

    #[tokio::test]
    async fn waiter_removed_after_match() {
        let bus = SignalBus::new();
        let _rx = bus.register_waiter(|_| true);
        assert_eq!(bus.waiter_count(), 1);

        bus.emit(PageSignal::WindowBlur);

        assert_eq!(bus.waiter_count(), 0);
    }

    #[tokio::test]
    async fn dropped_receivers_pruned_on_emit() {
        let bus = SignalBus::new();
        let rx = bus.register_waiter(|s| matches!(s, PageSignal::WindowBlur));
        drop(rx);
        assert_eq!(bus.waiter_count(), 1);

        // Non-matching signal still clears the dead entry.
        bus.emit(PageSignal::VisibilityHidden);

        assert_eq!(bus.waiter_count(), 0);
    }
}
