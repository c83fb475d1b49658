//! Invalidation of superseded pipeline runs.
//!
//! Each run takes a [`RunTicket`] when it starts. Starting another run makes
//! every earlier ticket stale, and a stale run must drop its result instead of
//! publishing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default)]
pub struct RefreshGuard {
    latest: Arc<AtomicU64>,
}

/// Identifies one run. Only the most recently issued ticket is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunTicket(u64);

impl RunTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

impl RefreshGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new ticket, invalidating all earlier ones.
    pub fn begin(&self) -> RunTicket {
        RunTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: RunTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Cancels every outstanding run without starting a new one.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ticket_supersedes_old() {
        let guard = RefreshGuard::new();
        let first = guard.begin();
        assert!(guard.is_current(first));

        let second = guard.begin();
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn test_clones_share_state() {
        let guard = RefreshGuard::new();
        let ticket = guard.begin();
        guard.clone().begin();
        assert!(!guard.is_current(ticket));
    }

    #[test]
    fn test_invalidate() {
        let guard = RefreshGuard::new();
        let ticket = guard.begin();
        guard.invalidate();
        assert!(!guard.is_current(ticket));
    }
}
