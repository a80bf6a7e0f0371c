//! Bound on segments accepted but not yet completed.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counting budget shared by every link on a router.
///
/// One unit is reserved per segment when a message is accepted and released
/// when that segment completes or is abandoned.
#[derive(Debug)]
pub(crate) struct TxBudget {
    depth: usize,
    used: AtomicUsize,
}

impl TxBudget {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            depth,
            used: AtomicUsize::new(0),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Reserve `units`, or leave the budget untouched if they do not fit.
    pub(crate) fn try_reserve(&self, units: usize) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(units).filter(|&total| total <= self.depth)
            })
            .is_ok()
    }

    pub(crate) fn release(&self, units: usize) {
        let previous = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                Some(used.saturating_sub(units))
            })
            .unwrap_or_default();
        if previous < units {
            tracing::error!(previous, units, "transmit budget released more than reserved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_up_to_depth() {
        let budget = TxBudget::new(5);
        assert!(budget.try_reserve(3));
        assert!(budget.try_reserve(2));
        assert!(!budget.try_reserve(1));
        assert_eq!(budget.used(), 5);

        budget.release(4);
        assert!(!budget.try_reserve(2));
        assert!(budget.try_reserve(1));
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn test_oversized_request_rejected_without_side_effect() {
        let budget = TxBudget::new(3);
        assert!(!budget.try_reserve(4));
        assert_eq!(budget.used(), 0);
        assert_eq!(budget.depth(), 3);
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_depth() {
        let budget = std::sync::Arc::new(TxBudget::new(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = budget.clone();
                std::thread::spawn(move || (0..50).filter(|_| budget.try_reserve(1)).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 100);
        assert_eq!(budget.used(), 100);
    }
}
