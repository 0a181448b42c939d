//! Per-call deadline for blocking session operations

use std::time::Duration;
use tokio::time::Instant;

/// Point in time after which a wait gives up. `None` waits forever.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<Instant>,
    timeout: Option<Duration>,
}

impl Deadline {
    /// Deadline `timeout` from now. Durations too large to represent are
    /// treated as no deadline.
    pub(crate) fn after(timeout: Option<Duration>) -> Self {
        let at = timeout.and_then(|t| Instant::now().checked_add(t));
        Self { at, timeout }
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    pub(crate) fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// The duration this deadline was armed with
    pub(crate) fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_timeout() {
        let deadline = Deadline::after(Some(Duration::from_millis(100)));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.timeout(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_never_expires() {
        let deadline = Deadline::after(None);
        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert!(!deadline.is_expired());
        assert!(deadline.instant().is_none());
    }

    #[tokio::test]
    async fn test_huge_timeout_is_unbounded() {
        let deadline = Deadline::after(Some(Duration::MAX));
        assert!(deadline.instant().is_none());
        assert!(!deadline.is_expired());
    }
}
