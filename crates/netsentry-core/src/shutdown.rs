//! Cooperative shutdown signalling.
//!
//! The pipeline owns no global state; cancellation is an explicit value
//! passed to every component that can block. The flag is observed at the
//! top of each pipeline iteration and inside the live capture poll, so a
//! shutdown request is honored within one capture timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable cancellation token shared between the pipeline and its tasks.
///
/// # Examples
/// ```
/// use netsentry_core::ShutdownFlag;
///
/// let flag = ShutdownFlag::new();
/// assert!(!flag.is_set());
/// flag.trigger();
/// assert!(flag.is_set());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::ShutdownFlag;

    #[test]
    fn new_flag_is_unset() {
        assert!(!ShutdownFlag::new().is_set());
    }

    #[test]
    fn trigger_is_idempotent() {
        let flag = ShutdownFlag::new();
        flag.trigger();
        flag.trigger();
        assert!(flag.is_set());
    }

    #[test]
    fn clones_share_state() {
        let flag = ShutdownFlag::new();
        let other = flag.clone();
        other.trigger();
        assert!(flag.is_set());
    }
}
