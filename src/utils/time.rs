use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Logical timestamp handed out by [`LogicalClock`]; `0` is reserved for "not yet"
pub type Timestamp = u64;

/// Strictly increasing counter used to order fetches and mutations.
///
/// Wall-clock readings can tie under coarse timer resolution; a counter never does,
/// so "started before" is always decidable between two operations on one cache.
#[derive(Debug)]
pub struct LogicalClock {
    last: AtomicU64,
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalClock {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Returns a timestamp greater than every one previously returned
    pub fn now(&self) -> Timestamp {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last issued timestamp without advancing the clock
    pub fn current(&self) -> Timestamp {
        self.last.load(Ordering::SeqCst)
    }
}
