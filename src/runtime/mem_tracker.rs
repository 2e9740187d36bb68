use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("memory limit exceeded: {label} limit {limit} bytes, consumption {consumption} bytes, requested {requested} bytes")]
pub struct MemLimitExceeded {
    pub label: String,
    pub limit: usize,
    pub consumption: usize,
    pub requested: usize,
}

/// Tracks the bytes of row batches an instance has produced and not yet handed off.
#[derive(Debug)]
pub struct MemTracker {
    label: String,
    limit: Option<usize>,
    consumption: AtomicUsize,
    peak: AtomicUsize,
}

impl MemTracker {
    pub fn new(label: String, limit: Option<usize>) -> Arc<Self> {
        Arc::new(MemTracker {
            label,
            limit,
            consumption: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Reserves `bytes`; the reservation is given back when the returned guard is dropped.
    pub fn try_consume(self: &Arc<Self>, bytes: usize) -> Result<MemReservation, MemLimitExceeded> {
        let consumption = self.consumption.fetch_add(bytes, Ordering::AcqRel) + bytes;
        if let Some(limit) = self.limit {
            if consumption > limit {
                self.consumption.fetch_sub(bytes, Ordering::AcqRel);
                return Err(MemLimitExceeded {
                    label: self.label.clone(),
                    limit,
                    consumption: consumption - bytes,
                    requested: bytes,
                });
            }
        }
        self.peak.fetch_max(consumption, Ordering::AcqRel);
        Ok(MemReservation {
            tracker: Some(self.clone()),
            bytes,
        })
    }

    fn release(&self, bytes: usize) {
        self.consumption.fetch_sub(bytes, Ordering::AcqRel);
    }

    pub fn consumption(&self) -> usize {
        self.consumption.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

/// Bytes held against a [`MemTracker`] until dropped.
#[derive(Debug, Default)]
pub struct MemReservation {
    tracker: Option<Arc<MemTracker>>,
    bytes: usize,
}

impl MemReservation {
    /// A reservation that tracks nothing.
    pub fn untracked() -> Self {
        MemReservation::default()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for MemReservation {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.release(self.bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_is_released_on_drop() {
        let tracker = MemTracker::new("test".to_string(), Some(100));
        let a = tracker.try_consume(60).unwrap();
        assert_eq!(tracker.consumption(), 60);
        let err = tracker.try_consume(50).unwrap_err();
        assert_eq!(err.requested, 50);
        assert_eq!(tracker.consumption(), 60);
        drop(a);
        assert_eq!(tracker.consumption(), 0);
        let _b = tracker.try_consume(100).unwrap();
        assert_eq!(tracker.peak(), 100);
    }

    #[test]
    fn unlimited_tracker_only_records_peak() {
        let tracker = MemTracker::new("test".to_string(), None);
        let a = tracker.try_consume(1 << 20).unwrap();
        let b = tracker.try_consume(1 << 20).unwrap();
        drop((a, b));
        assert_eq!(tracker.consumption(), 0);
        assert_eq!(tracker.peak(), 2 << 20);
    }
}
