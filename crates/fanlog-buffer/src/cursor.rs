//! Reader cursors
//!
//! A cursor is one reader's position in the chain. Cursors share nothing
//! but the immutable nodes, so any number of them can traverse the same
//! chain concurrently with each other and with the writer.

use std::sync::Arc;
use std::time::Duration;

use fanlog_core::BufferError;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::node::Node;

/// A reader's position in the buffer
///
/// Cloning a cursor yields an independent cursor at the same position.
#[derive(Debug, Clone)]
pub struct Cursor {
    node: Arc<Node>,
}

impl Cursor {
    /// Create a cursor positioned at `node`
    ///
    /// The node's own events count as already read.
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    /// Node the cursor is positioned at
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Advance to the next batch
    ///
    /// Waits if the reader has caught up with the writer. Empty splice
    /// placeholders are stepped over. On error the position is unchanged.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `cancel` fires while waiting
    /// - `Closed` if the buffer was closed and every batch has been read
    pub async fn advance(&mut self, cancel: &CancellationToken) -> Result<Arc<Node>, BufferError> {
        let mut next = self.node.next(cancel).await?;
        while next.is_sentinel() {
            next = next.next(cancel).await?;
        }

        trace!(first_index = ?next.first_index(), "Cursor advanced");
        self.node = Arc::clone(&next);
        Ok(next)
    }

    /// Advance, giving up after `timeout`
    ///
    /// An elapsed timeout is reported as `Cancelled`.
    pub async fn advance_timeout(&mut self, timeout: Duration) -> Result<Arc<Node>, BufferError> {
        let cancel = CancellationToken::new();
        match tokio::time::timeout(timeout, self.advance(&cancel)).await {
            Ok(result) => result,
            Err(_) => Err(BufferError::Cancelled),
        }
    }

    /// Advance only if the next batch is already published
    pub fn try_advance(&mut self) -> Result<Option<Arc<Node>>, BufferError> {
        let mut current = Arc::clone(&self.node);
        loop {
            match current.try_next()? {
                None => return Ok(None),
                Some(next) if next.is_sentinel() => current = next,
                Some(next) => {
                    self.node = Arc::clone(&next);
                    return Ok(Some(next));
                }
            }
        }
    }

    /// Turn the cursor into a stream of batches
    ///
    /// The stream yields the error that ends the traversal (`Cancelled` or
    /// `Closed`) once, then finishes.
    pub fn into_stream(
        mut self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<Arc<Node>, BufferError>> + Send + 'static {
        async_stream::stream! {
            loop {
                match self.advance(&cancel).await {
                    Ok(node) => yield Ok(node),
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventBuffer;
    use fanlog_core::{Event, Topic};
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready, task};

    fn event(index: u64) -> Event {
        Event::end_of_snapshot(index, Topic::ServiceHealth)
    }

    #[tokio::test]
    async fn test_advance_in_order() {
        let buffer = EventBuffer::new();
        let mut cursor = buffer.cursor();
        let cancel = CancellationToken::new();

        buffer.append(vec![event(0)]).unwrap();
        buffer.append(vec![event(1)]).unwrap();

        let first = cursor.advance(&cancel).await.unwrap();
        assert_eq!(first.events()[0].index, 0);
        let second = cursor.advance(&cancel).await.unwrap();
        assert_eq!(second.events()[0].index, 1);
        assert!(Arc::ptr_eq(cursor.node(), &second));
    }

    #[test]
    fn test_third_advance_blocks_until_append() {
        let buffer = EventBuffer::new();
        let mut cursor = buffer.cursor();
        let cancel = CancellationToken::new();

        buffer.append(vec![event(0)]).unwrap();
        buffer.append(vec![event(1)]).unwrap();
        assert_eq!(cursor.try_advance().unwrap().unwrap().first_index(), Some(0));
        assert_eq!(cursor.try_advance().unwrap().unwrap().first_index(), Some(1));

        let mut third = task::spawn(cursor.advance(&cancel));
        assert_pending!(third.poll());

        buffer.append(vec![event(2)]).unwrap();
        assert!(third.is_woken());
        let node = assert_ready!(third.poll()).unwrap();
        assert_eq!(node.first_index(), Some(2));
    }

    #[test]
    fn test_cancel_leaves_position_unchanged() {
        let buffer = EventBuffer::new();
        buffer.append(vec![event(0)]).unwrap();
        let mut cursor = buffer.cursor();
        let before = Arc::clone(cursor.node());
        let cancel = CancellationToken::new();

        {
            let mut advance = task::spawn(cursor.advance(&cancel));
            assert_pending!(advance.poll());
            cancel.cancel();
            assert_eq!(
                assert_ready!(advance.poll()).unwrap_err(),
                BufferError::Cancelled
            );
        }
        assert!(Arc::ptr_eq(cursor.node(), &before));

        // The batch appended after the cancelled read is still delivered
        buffer.append(vec![event(1)]).unwrap();
        let next = cursor.try_advance().unwrap().unwrap();
        assert_eq!(next.first_index(), Some(1));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_returns_immediately() {
        let buffer = EventBuffer::new();
        let mut cursor = buffer.cursor();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(
            cursor.advance(&cancel).await.unwrap_err(),
            BufferError::Cancelled
        );
    }

    #[tokio::test]
    async fn test_resolved_successor_wins_over_cancelled_token() {
        let buffer = EventBuffer::new();
        let mut cursor = buffer.cursor();
        buffer.append(vec![event(0)]).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let node = cursor.advance(&cancel).await.unwrap();
        assert_eq!(node.first_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_timeout() {
        let buffer = EventBuffer::new();
        let mut cursor = buffer.cursor();
        let before = Arc::clone(cursor.node());

        let err = cursor
            .advance_timeout(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, BufferError::Cancelled);
        assert!(Arc::ptr_eq(cursor.node(), &before));

        buffer.append(vec![event(0)]).unwrap();
        let node = cursor
            .advance_timeout(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(node.first_index(), Some(0));
    }

    #[tokio::test]
    async fn test_closed_after_last_batch() {
        let buffer = EventBuffer::new();
        let mut cursor = buffer.cursor();
        let cancel = CancellationToken::new();

        buffer.append(vec![event(0)]).unwrap();
        buffer.close();

        assert_eq!(cursor.advance(&cancel).await.unwrap().first_index(), Some(0));
        assert_eq!(cursor.advance(&cancel).await.unwrap_err(), BufferError::Closed);
        // Stays closed
        assert_eq!(cursor.try_advance().unwrap_err(), BufferError::Closed);
    }

    #[test]
    fn test_clone_is_independent() {
        let buffer = EventBuffer::new();
        let mut a = buffer.cursor();
        let mut b = a.clone();
        buffer.append(vec![event(0)]).unwrap();

        assert!(a.try_advance().unwrap().is_some());
        assert!(a.try_advance().unwrap().is_none());
        assert_eq!(b.try_advance().unwrap().unwrap().first_index(), Some(0));
    }

    #[tokio::test]
    async fn test_into_stream_ends_after_close() {
        let buffer = EventBuffer::new();
        let cursor = buffer.cursor();
        for i in 0..3 {
            buffer.append(vec![event(i)]).unwrap();
        }
        buffer.close();

        let items: Vec<_> = cursor
            .into_stream(CancellationToken::new())
            .collect()
            .await;
        assert_eq!(items.len(), 4);
        let indexes: Vec<u64> = items[..3]
            .iter()
            .map(|item| item.as_ref().unwrap().events()[0].index)
            .collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(items[3].as_ref().unwrap_err(), &BufferError::Closed);
    }

    #[tokio::test]
    async fn test_into_stream_cancelled() {
        let buffer = EventBuffer::new();
        let cancel = CancellationToken::new();
        let mut stream = Box::pin(buffer.cursor().into_stream(cancel.clone()));

        buffer.append(vec![event(0)]).unwrap();
        assert!(stream.next().await.unwrap().is_ok());

        cancel.cancel();
        assert_eq!(
            stream.next().await.unwrap().unwrap_err(),
            BufferError::Cancelled
        );
        assert!(stream.next().await.is_none());
    }
}
