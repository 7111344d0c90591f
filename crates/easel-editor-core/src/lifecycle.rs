//! Session mount state.

use tokio_util::sync::CancellationToken;

/// Shared "is this session still mounted" flag.
///
/// Every asynchronous continuation checks it before touching the engine.
/// Tearing down also cancels every token handed out by [`MountGuard::child_token`],
/// which stops the session's timer lines.
#[derive(Debug, Clone, Default)]
pub struct MountGuard {
    token: CancellationToken,
}

impl MountGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Idempotent.
    pub fn teardown(&self) {
        self.token.cancel();
    }

    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Resolves once the session is torn down.
    pub async fn torn_down(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_cancels_children() {
        let guard = MountGuard::new();
        let clone = guard.clone();
        let child = guard.child_token();
        assert!(clone.is_mounted());

        guard.teardown();
        guard.teardown();
        assert!(!clone.is_mounted());
        assert!(child.is_cancelled());
    }
}
