//! Per-registration call counters.

use std::sync::{Mutex, MutexGuard, PoisonError};

use raas_core::info::ServiceInfo;
use tokio::sync::broadcast;

/// Snapshots buffered for a registration that is not being polled.
///
/// Older snapshots are dropped once the buffer is full; the latest value
/// is always available from the aggregator itself.
pub const SNAPSHOT_BUFFER: usize = 64;

/// Folds call lifecycle events into [`ServiceInfo`] snapshots.
///
/// Every change emits a snapshot to the current subscribers. Updates are
/// serialized, so snapshots arrive in the order the counters changed.
#[derive(Debug)]
pub(crate) struct InfoAggregator {
    state: Mutex<ServiceInfo>,
    snapshots: broadcast::Sender<ServiceInfo>,
}

impl InfoAggregator {
    pub(crate) fn new() -> Self {
        let (snapshots, _) = broadcast::channel(SNAPSHOT_BUFFER);
        Self {
            state: Mutex::new(ServiceInfo::default()),
            snapshots,
        }
    }

    /// Receive every snapshot emitted from now on.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ServiceInfo> {
        self.snapshots.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, ServiceInfo> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut ServiceInfo)) {
        let mut state = self.state();
        apply(&mut state);
        // Nobody listening is fine; the latest value stays readable.
        let _ = self.snapshots.send(*state);
    }

    pub(crate) fn record_called(&self) {
        self.update(|info| info.called_num += 1);
    }

    pub(crate) fn record_completed(&self) {
        self.update(|info| info.completed_num += 1);
    }

    pub(crate) fn record_error(&self) {
        self.update(|info| info.error_num += 1);
    }

    pub(crate) fn snapshot(&self) -> ServiceInfo {
        *self.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_snapshots_follow_updates() {
        let info = InfoAggregator::new();
        let mut rx = info.subscribe();

        info.record_called();
        info.record_called();
        info.record_completed();
        info.record_error();

        let seen: Vec<(u64, u64, u64)> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|s| (s.called_num, s.completed_num, s.error_num))
            .collect();
        assert_eq!(seen, vec![(1, 0, 0), (2, 0, 0), (2, 1, 0), (2, 1, 1)]);
        assert_eq!(info.snapshot().in_flight(), 0);
    }

    #[test]
    fn test_unread_snapshots_stay_bounded() {
        let info = InfoAggregator::new();
        let mut rx = info.subscribe();

        for _ in 0..500 {
            info.record_called();
            info.record_completed();
        }

        let skipped = match rx.try_recv() {
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => skipped,
            other => panic!("expected a lag, got {other:?}"),
        };
        let kept: Vec<ServiceInfo> = std::iter::from_fn(|| rx.try_recv().ok()).collect();

        assert_eq!(kept.len(), SNAPSHOT_BUFFER);
        assert_eq!(skipped as usize + kept.len(), 1000);
        assert_eq!(kept.last(), Some(&ServiceInfo::new(500, 500, 0)));
    }

    #[test]
    fn test_no_subscriber_keeps_counting() {
        let info = InfoAggregator::new();

        info.record_called();
        assert_eq!(info.snapshot().called_num, 1);
    }
}
