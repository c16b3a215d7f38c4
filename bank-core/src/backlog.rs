use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::MAX_BACKLOG;

/// Per-user in-flight request counter. Admits up to `MAX_BACKLOG`; further attempts fail fast.
///
/// `try_add` compares `< MAX_BACKLOG` strictly inside the same atomic read-modify-write as the
/// increment (`fetch_update`), so no interleaving can ever observe more than `MAX_BACKLOG`
/// successful admissions starting from zero, so there is no transient over-cap value to roll back,
/// unlike an increment-then-decrement-on-overflow scheme.
#[derive(Debug, Default)]
pub(crate) struct Backlog(AtomicU32);

impl Backlog {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Returns `true` if the request was admitted (backlog incremented), `false` if the cap was
    /// already reached.
    pub fn try_add(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                if cur < MAX_BACKLOG {
                    Some(cur + 1)
                } else {
                    None
                }
            })
            .is_ok()
    }

    /// Decrements with a floor of zero. Never goes negative.
    pub fn release(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some(cur.saturating_sub(1))
            });
    }

    #[cfg(test)]
    pub fn current(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn admits_up_to_cap_then_rejects() {
        let backlog = Backlog::new();
        for _ in 0..MAX_BACKLOG {
            assert!(backlog.try_add());
        }
        assert!(!backlog.try_add());
        assert_eq!(backlog.current(), MAX_BACKLOG);
    }

    #[test]
    fn release_floors_at_zero() {
        let backlog = Backlog::new();
        backlog.release();
        backlog.release();
        assert_eq!(backlog.current(), 0);

        assert!(backlog.try_add());
        backlog.release();
        assert_eq!(backlog.current(), 0);
    }

    #[tokio::test]
    async fn exactly_ten_of_a_hundred_concurrent_admissions_succeed() {
        let backlog = Arc::new(Backlog::new());
        let mut tasks = Vec::with_capacity(100);
        for _ in 0..100 {
            let backlog = backlog.clone();
            tasks.push(tokio::spawn(async move { backlog.try_add() }));
        }

        let mut succeeded = 0u32;
        for task in tasks {
            if task.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, MAX_BACKLOG);
        assert_eq!(backlog.current(), MAX_BACKLOG);
    }
}
