//! One-shot successor link
//!
//! Every node owns a link that starts unresolved and is resolved exactly
//! once by the writer, either to the next node or to `Closed`. Any number of
//! readers may wait on the same link; resolution wakes all of them.

use std::fmt;
use std::sync::{Arc, OnceLock};

use fanlog_core::BufferError;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::node::Node;

/// Value a link resolves to
#[derive(Debug)]
pub(crate) enum Successor {
    /// The next node in the chain
    Node(Arc<Node>),
    /// The buffer was closed; nothing follows
    Closed,
}

impl Successor {
    /// Clone out the successor node, mapping `Closed` to its error
    pub(crate) fn to_node(&self) -> Result<Arc<Node>, BufferError> {
        match self {
            Self::Node(node) => Ok(Arc::clone(node)),
            Self::Closed => Err(BufferError::Closed),
        }
    }
}

/// Resolve-once broadcast future for a node's successor
#[derive(Default)]
pub(crate) struct Link {
    next: OnceLock<Successor>,
    ready: Notify,
}

impl Link {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The resolved successor, if any
    pub(crate) fn get(&self) -> Option<&Successor> {
        self.next.get()
    }

    /// Resolve the link and wake every waiter
    pub(crate) fn resolve(&self, successor: Successor) -> Result<(), BufferError> {
        self.next
            .set(successor)
            .map_err(|_| BufferError::AlreadyResolved)?;
        self.ready.notify_waiters();
        Ok(())
    }

    /// Wait until the link is resolved or `cancel` fires
    ///
    /// Returns immediately when the link is already resolved. Dropping the
    /// returned future deregisters the waiter.
    pub(crate) async fn wait(&self, cancel: &CancellationToken) -> Result<&Successor, BufferError> {
        if let Some(successor) = self.next.get() {
            return Ok(successor);
        }

        let notified = self.ready.notified();
        tokio::pin!(notified);

        loop {
            // Register before re-checking: a resolve landing between the
            // check and the await must still wake us.
            notified.as_mut().enable();
            if let Some(successor) = self.next.get() {
                return Ok(successor);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(BufferError::Cancelled),
                () = notified.as_mut() => {}
            }

            notified.set(self.ready.notified());
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.next.get() {
            None => "pending",
            Some(Successor::Node(_)) => "linked",
            Some(Successor::Closed) => "closed",
        };
        f.debug_struct("Link").field("state", &state).finish()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        // Unlink iteratively; dropping a long chain through the default
        // glue would recurse once per node.
        let mut next = self.next.take();
        while let Some(Successor::Node(node)) = next {
            let Ok(node) = Arc::try_unwrap(node) else {
                break;
            };
            let Ok(mut link) = Arc::try_unwrap(node.into_link()) else {
                break;
            };
            next = link.next.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Origin;
    use std::sync::Weak;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_resolve_once() {
        let origin = Origin::new();
        let link = Link::new();
        assert!(link.get().is_none());

        link.resolve(Successor::Closed).unwrap();
        assert!(matches!(link.get(), Some(Successor::Closed)));

        let err = link
            .resolve(Successor::Node(Arc::new(Node::sentinel(&origin))))
            .unwrap_err();
        assert_eq!(err, BufferError::AlreadyResolved);
        // First resolution wins
        assert!(matches!(link.get(), Some(Successor::Closed)));
    }

    #[test]
    fn test_wait_fast_path() {
        let link = Link::new();
        link.resolve(Successor::Closed).unwrap();

        let cancel = CancellationToken::new();
        let mut wait = task::spawn(link.wait(&cancel));
        let successor = assert_ready!(wait.poll()).unwrap();
        assert!(matches!(successor, Successor::Closed));
    }

    #[test]
    fn test_wait_wakes_on_resolve() {
        let origin = Origin::new();
        let link = Link::new();
        let cancel = CancellationToken::new();

        let mut first = task::spawn(link.wait(&cancel));
        let mut second = task::spawn(link.wait(&cancel));
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        let node = Arc::new(Node::sentinel(&origin));
        link.resolve(Successor::Node(Arc::clone(&node))).unwrap();

        assert!(first.is_woken());
        assert!(second.is_woken());
        let resolved = assert_ready!(first.poll()).unwrap().to_node().unwrap();
        assert!(Arc::ptr_eq(&resolved, &node));
        assert!(assert_ready!(second.poll()).is_ok());
    }

    #[test]
    fn test_wait_cancelled() {
        let link = Link::new();
        let cancel = CancellationToken::new();

        let mut wait = task::spawn(link.wait(&cancel));
        assert_pending!(wait.poll());

        cancel.cancel();
        assert!(wait.is_woken());
        assert_eq!(
            assert_ready!(wait.poll()).err(),
            Some(BufferError::Cancelled)
        );
    }

    #[test]
    fn test_closed_maps_to_error() {
        assert_eq!(Successor::Closed.to_node().err(), Some(BufferError::Closed));
    }

    #[test]
    fn test_long_chain_drop_is_iterative() {
        let origin = Origin::new();
        let head = Arc::new(Node::sentinel(&origin));
        let mut tail = Arc::clone(&head);
        for _ in 0..200_000 {
            let node = Arc::new(Node::sentinel(&origin));
            tail.link()
                .resolve(Successor::Node(Arc::clone(&node)))
                .unwrap();
            tail = node;
        }
        let weak_tail: Weak<Node> = Arc::downgrade(&tail);
        drop(tail);

        drop(head);
        assert!(weak_tail.upgrade().is_none());
    }
}
