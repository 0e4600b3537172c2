use crate::error::GenerationError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Cooperative cancellation flag shared between a run and whoever may stop it
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` once the token has been cancelled
    pub fn check(&self) -> Result<(), GenerationError> {
        if self.is_cancelled() {
            Err(GenerationError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Cancel the token from a background thread after `timeout` elapses
    pub fn cancel_after(&self, timeout: Duration) {
        let token = self.clone();
        thread::spawn(move || {
            thread::sleep(timeout);
            if !token.is_cancelled() {
                log::warn!("Maximum runtime of {}s reached, cancelling", timeout.as_secs());
                token.cancel();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());

        other.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(GenerationError::Cancelled)));
    }

    #[test]
    fn test_cancel_after_fires() {
        let token = CancellationToken::new();
        token.cancel_after(Duration::from_millis(10));
        for _ in 0..200 {
            if token.is_cancelled() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("token was not cancelled by the watchdog");
    }
}
