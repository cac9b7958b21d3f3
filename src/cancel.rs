//! Linking of parent and local cancellation signals.

use tokio_util::sync::{CancellationToken, DropGuard};

/// A derived cancellation signal that fires when either a parent or a local
/// token is cancelled.
///
/// Every command, flow, and flow-drain operation runs under a scope linking
/// the machine's root token with the caller-supplied one: cancelling the
/// machine cancels every descendant operation, while cancelling one
/// operation's local token leaves siblings and the machine untouched.
///
/// Releasing the scope's tracking resources is tied to `Drop`, so it happens
/// exactly once on every exit path and a double release is impossible. After
/// the scope is dropped the local token is no longer observed.
#[derive(Debug)]
pub struct CancellationScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl CancellationScope {
    /// Create a scope whose token is a child of `parent` and additionally
    /// mirrors cancellation of `local`.
    pub fn link(parent: &CancellationToken, local: &CancellationToken) -> Self {
        let token = parent.child_token();
        // A local token cancelled before linking must be visible without a
        // trip through the scheduler.
        if local.is_cancelled() {
            token.cancel();
        }
        let done = CancellationToken::new();

        let forward = token.clone();
        let local = local.clone();
        let watcher_done = done.clone();
        tokio::spawn(async move {
            tokio::select! {
                // Biased so a released scope stops watching deterministically.
                biased;
                _ = watcher_done.cancelled() => {}
                _ = forward.cancelled() => {}
                _ = local.cancelled() => forward.cancel(),
            }
        });

        Self {
            token,
            _guard: done.drop_guard(),
        }
    }

    /// The derived token to pass into the guarded operation.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
