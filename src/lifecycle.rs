use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts live stages of a pipeline.
///
/// Every stage thread holds a [`LifecycleGuard`] for its whole run. The guard is
/// released on every exit path, unwinding included, so `active()` drops back to
/// zero once all stages are gone.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    active: Arc<AtomicUsize>,
    started: Arc<AtomicUsize>,
}

impl Lifecycle {
    /// Create a counter with no stages started
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running stage
    pub fn enter(&self, stage: &str) -> LifecycleGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(stage, "stage started");
        LifecycleGuard {
            active: Arc::clone(&self.active),
            stage: stage.to_string(),
        }
    }

    /// Stages currently running
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stages that have ever started
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Check if no stage is running
    pub fn is_idle(&self) -> bool {
        self.active() == 0
    }
}

/// Marks one stage as running until dropped
#[derive(Debug)]
pub struct LifecycleGuard {
    active: Arc<AtomicUsize>,
    stage: String,
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(stage = %self.stage, "stage exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_enter_and_exit() {
        let lifecycle = Lifecycle::new();
        let a = lifecycle.enter("a");
        let b = lifecycle.enter("b");
        assert_eq!(lifecycle.active(), 2);
        drop(a);
        assert_eq!(lifecycle.active(), 1);
        drop(b);
        assert!(lifecycle.is_idle());
        assert_eq!(lifecycle.started(), 2);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let lifecycle = Lifecycle::new();
        let shared = lifecycle.clone();
        let result = thread::spawn(move || {
            let _guard = shared.enter("doomed");
            panic!("stage failure");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(lifecycle.active(), 0);
        assert_eq!(lifecycle.started(), 1);
    }
}
