//! Shutdown coordination.

use tokio::sync::watch;

/// Trigger side of a cancellation signal.
///
/// Contexts listening to a `Shutdown` (see [`Context::listening_to`]) observe
/// the trigger even when they subscribe after it fired. Dropping a `Shutdown`
/// without triggering it leaves its listeners waiting forever.
///
/// [`Context::listening_to`]: crate::lifecycle::Context::listening_to
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered shutdown signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Triggering twice is a no-op.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_sticky() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());

        // Late subscribers still see the fired state.
        let rx = shutdown.subscribe();
        assert!(*rx.borrow());
    }
}
