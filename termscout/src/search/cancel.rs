use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag for stopping a run early
///
/// Clones share the same flag. The walker checks it between entries and workers check
/// it before each file, so a cancelled run still drains cleanly and returns the results
/// gathered so far.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(!CancellationToken::new().is_cancelled());
    }
}
