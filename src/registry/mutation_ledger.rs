use dashmap::DashMap;
use tracing::trace;

use crate::time::Timestamp;

/// Start and end of the latest mutation of one key.
///
/// `ended_at == 0` means the mutation is still resolving its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationWindow {
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
}

impl MutationWindow {
    pub fn in_progress(&self) -> bool {
        self.ended_at == 0
    }

    /// Whether this mutation makes the result of a fetch started at `fetch_started_at`
    /// non-authoritative: it began at or after the fetch, it completed after the fetch
    /// began, or it has not decided its value yet. Ties count as superseding.
    pub fn supersedes(
        &self,
        fetch_started_at: Timestamp,
    ) -> bool {
        fetch_started_at <= self.started_at || fetch_started_at <= self.ended_at || self.in_progress()
    }
}

/// Per-key mutation windows. Written only by the mutation engine.
#[derive(Debug, Default)]
pub struct MutationLedger {
    windows: DashMap<String, MutationWindow>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<MutationWindow> {
        self.windows.get(key).map(|w| *w)
    }

    /// Open a new window, replacing any previous one for `key`
    pub fn begin(
        &self,
        key: &str,
        started_at: Timestamp,
    ) -> MutationWindow {
        let window = MutationWindow {
            started_at,
            ended_at: 0,
        };
        self.windows.insert(key.to_string(), window);
        trace!(key, started_at, "mutation window opened");
        window
    }

    /// Close the window opened at `started_at`. Returns false if a newer mutation has
    /// replaced it in the meantime, in which case nothing changes.
    pub fn end(
        &self,
        key: &str,
        started_at: Timestamp,
        ended_at: Timestamp,
    ) -> bool {
        match self.windows.get_mut(key) {
            Some(mut w) if w.started_at == started_at => {
                w.ended_at = ended_at;
                trace!(key, started_at, ended_at, "mutation window closed");
                true
            }
            _ => false,
        }
    }

    /// Whether any recorded mutation supersedes a fetch started at `fetch_started_at`
    pub fn supersedes(
        &self,
        key: &str,
        fetch_started_at: Timestamp,
    ) -> bool {
        self.get(key).is_some_and(|w| w.supersedes(fetch_started_at))
    }
}
