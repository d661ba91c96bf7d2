use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative, one-shot, sticky stop signal observed by the planner and
/// runner at safe points. Once observed, the bit latches: every later call
/// on the engine also sees it stopped.
#[derive(Clone, Debug, Default)]
pub(crate) struct CancelToken {
    stopped: Arc<AtomicBool>,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        CancelToken {
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send the graceful stop signal. Idempotent.
    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True if a stop has ever been observed or requested.
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latches_after_first_observation() {
        let token = CancelToken::new();
        assert!(!token.is_stopped());
        token.stop();
        assert!(token.is_stopped());
        assert!(token.is_stopped());
    }

    #[test]
    fn clone_shares_the_same_signal() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.stop();
        assert!(token.is_stopped());
    }
}
