//! Cancellation scopes.
//!
//! A [`Scope`] couples a [`CancellationToken`] with an optional deadline. Every
//! operation that can block (process waits, frame channel sends and receives)
//! takes a scope and selects on [`Scope::cancelled`] alongside its normal
//! completion, so cancelling a scope or letting its deadline pass unblocks
//! everything started under it.
//!
//! Scopes form a tree: [`Scope::child`] derives a scope that is cancelled
//! whenever its parent is, while cancelling the child leaves the parent
//! untouched. A child never outlives its parent's deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cancellation and deadline context shared by an operation and everything it
/// starts.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Create a root scope with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root scope that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Create a root scope that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child scope inheriting this scope's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child scope whose deadline is the earlier of this scope's
    /// deadline and `now + timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => parent.min(own),
            None => own,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the scope was cancelled explicitly or its deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline_exceeded()
    }

    /// Whether the deadline (if any) has passed.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// The deadline, if one was set on this scope or an ancestor.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, saturating at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// The underlying token, for APIs that accept one directly.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Return [`Error::Cancelled`] if the scope is no longer live.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(self.cancellation_error(operation))
        } else {
            Ok(())
        }
    }

    /// Drive `fut` to completion unless the scope is cancelled first.
    ///
    /// Cancellation wins ties so a cancelled scope never starts new work.
    pub async fn run<F>(&self, operation: &str, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(self.cancellation_error(operation)),
            out = fut => Ok(out),
        }
    }

    /// Build the error reported when `operation` is aborted by this scope.
    pub fn cancellation_error(&self, operation: &str) -> Error {
        if self.token.is_cancelled() {
            Error::cancelled(format!("{operation} cancelled"))
        } else if self.deadline_exceeded() {
            Error::cancelled(format!("{operation} deadline exceeded"))
        } else {
            Error::cancelled(operation.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parent_cancel_propagates_to_child() {
        let parent = Scope::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        // Resolves immediately once cancelled.
        grandchild.cancelled().await;
    }

    #[tokio::test]
    async fn child_cancel_does_not_touch_parent() {
        let parent = Scope::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let scope = Scope::with_timeout(Duration::from_millis(50));
        assert!(!scope.is_cancelled());

        scope.cancelled().await;
        assert!(scope.is_cancelled());
        assert!(scope.deadline_exceeded());

        let err = scope.check("recording").unwrap_err();
        assert!(err.to_string().contains("deadline exceeded"), "got: {err}");
    }

    #[tokio::test(start_paused = true)]
    async fn child_never_outlives_parent_deadline() {
        let parent = Scope::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        let tighter = parent.child_with_timeout(Duration::from_millis(10));
        assert!(tighter.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn run_returns_output_when_live() {
        let scope = Scope::new();
        let out = scope.run("add", async { 2 + 2 }).await.unwrap();
        assert_eq!(out, 4);
    }

    #[tokio::test]
    async fn run_aborts_when_cancelled() {
        let scope = Scope::new();
        scope.cancel();
        let result = scope
            .run("sleep", tokio::time::sleep(Duration::from_secs(60)))
            .await;
        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Cancelled: sleep cancelled");
    }

    #[test]
    fn remaining_is_none_without_deadline() {
        assert!(Scope::new().remaining().is_none());
        assert!(Scope::new().check("noop").is_ok());
    }
}
