//! Cooperative cancellation.
//!
//! Sampling loops check the token at the top of every iteration, so a
//! cancellation is observed between samples and never mid-decode.
//!
//! Tokens form a tree: a child observes its own cancellation and every
//! ancestor's, while cancelling a child leaves the parent untouched.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{MediaError, MediaResult};

/// Cloneable cancellation signal backed by a watch channel.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    parent: Option<Box<CancellationToken>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            parent: None,
        }
    }

    /// A token cancelled together with `self` that can also be cancelled
    /// on its own.
    pub fn child_token(&self) -> Self {
        Self {
            parent: Some(Box::new(self.clone())),
            ..Self::new()
        }
    }

    /// Signal cancellation to every clone and child of this token.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Yield point for sampling loops.
    pub fn check(&self) -> MediaResult<()> {
        if self.is_cancelled() {
            Err(MediaError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation has been requested here or on an ancestor.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any token clone, so waiting only errors
        // if every clone is gone, in which case nobody is waiting anyway.
        match &self.parent {
            Some(parent) => {
                tokio::select! {
                    _ = rx.wait_for(|cancelled| *cancelled) => {}
                    _ = Box::pin(parent.cancelled()) => {}
                }
            }
            None => {
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(MediaError::Cancelled)));
    }

    #[test]
    fn test_parent_cancels_children() {
        let root = CancellationToken::new();
        let child = root.child_token();
        let grandchild = child.child_token();
        assert!(!grandchild.is_cancelled());

        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_cancel_leaves_parent_running() {
        let root = CancellationToken::new();
        let first = root.child_token();
        first.cancel();

        assert!(first.is_cancelled());
        assert!(!root.is_cancelled());
        assert!(root.child_token().check().is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_child_wakes_on_parent_cancel() {
        let root = CancellationToken::new();
        let child = root.child_token();
        let handle = tokio::spawn(async move { child.cancelled().await });

        root.cancel();
        handle.await.unwrap();
    }
}
