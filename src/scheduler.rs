//! Refresh request coalescing.
//!
//! Requests arrive from any thread through a [`RefreshQueue`]. The batching
//! loop waits for the first request, keeps collecting for one batch window,
//! then hands the deduplicated ids to the tree in first-seen order.

use core::time::Duration;
use std::collections::HashSet;

use async_channel::{Receiver, Sender, TryRecvError};
use canopy_core::{NodeId, RefreshHandle};
use smol::Timer;

/// The sending half of the refresh queue.
#[derive(Debug, Clone)]
pub struct RefreshQueue {
    sender: Sender<NodeId>,
}

impl RefreshQueue {
    /// Creates a queue and the receiver the batching loop drains.
    #[must_use]
    pub fn new() -> (Self, Receiver<NodeId>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender }, receiver)
    }

    /// Enqueues `id`. Requests against a closed queue are dropped.
    pub fn request(&self, id: NodeId) {
        if self.sender.try_send(id).is_err() {
            tracing::trace!("refresh queue closed, dropping request");
        }
    }

    /// Stops accepting requests.
    pub fn close(&self) {
        self.sender.close();
    }

    /// Whether [`RefreshQueue::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// A handle that enqueues `id` when invoked.
    #[must_use]
    pub fn handle_for(&self, id: NodeId) -> RefreshHandle {
        let queue = self.clone();
        RefreshHandle::new(move || queue.request(id.clone()))
    }
}

/// Waits for the next batch of ids.
///
/// Returns `None` once the queue is closed and drained.
pub async fn next_batch(receiver: &Receiver<NodeId>, window: Duration) -> Option<Vec<NodeId>> {
    let first = receiver.recv().await.ok()?;
    if !window.is_zero() {
        Timer::after(window).await;
    }

    let mut ids = vec![first];
    loop {
        match receiver.try_recv() {
            Ok(id) => ids.push(id),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    let received = ids.len();
    let mut seen = HashSet::with_capacity(received);
    ids.retain(|id| seen.insert(id.clone()));
    tracing::debug!(received, unique = ids.len(), "refresh batch drained");
    Some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_are_deduplicated_in_first_seen_order() {
        let (queue, receiver) = RefreshQueue::new();
        for id in ["b", "a", "b", "c", "a"] {
            queue.request(NodeId::from(id));
        }
        let batch = smol::block_on(next_batch(&receiver, Duration::from_millis(1))).unwrap();
        assert_eq!(
            batch,
            vec![NodeId::from("b"), NodeId::from("a"), NodeId::from("c")]
        );
    }

    #[test]
    fn requests_inside_the_window_join_the_batch() {
        let (queue, receiver) = RefreshQueue::new();
        queue.request(NodeId::from("a"));
        let late = queue.clone();
        let batch = smol::block_on(async {
            let producer = smol::spawn(async move {
                Timer::after(Duration::from_millis(5)).await;
                late.request(NodeId::from("b"));
            });
            let batch = next_batch(&receiver, Duration::from_millis(100)).await;
            producer.await;
            batch
        });
        assert_eq!(batch.map(|ids| ids.len()), Some(2));
    }

    #[test]
    fn closed_queue_ends_batching() {
        let (queue, receiver) = RefreshQueue::new();
        queue.request(NodeId::from("a"));
        queue.close();
        assert!(queue.is_closed());
        queue.request(NodeId::from("dropped"));

        smol::block_on(async {
            assert_eq!(
                next_batch(&receiver, Duration::ZERO).await,
                Some(vec![NodeId::from("a")])
            );
            assert_eq!(next_batch(&receiver, Duration::ZERO).await, None);
        });
    }

    #[test]
    fn handles_enqueue_their_id() {
        let (queue, receiver) = RefreshQueue::new();
        let handle = queue.handle_for(NodeId::from("view"));
        handle.request();
        handle.request();
        assert_eq!(receiver.len(), 2);
    }
}
