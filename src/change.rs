//! Change notifications for the transport layer.

use core::pin::Pin;
use core::task::{Context, Poll};
use std::sync::{Mutex, PoisonError};

use async_channel::{Receiver, Sender};
use canopy_core::NodeId;
use futures::Stream;
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};

use crate::Patch;

/// The result of rebuilding one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// The rebuilt view.
    pub view_id: NodeId,
    /// Position of the view's output inside the widget-only forest.
    #[serde(rename = "widgetIndices")]
    pub indices: Vec<usize>,
    /// Operations turning the old output into the new one.
    pub patch: Patch,
}

pin_project! {
    /// A stream of change batches, one item per applied refresh batch.
    ///
    /// The stream ends when the tree is disposed.
    #[derive(Debug)]
    pub struct ChangeStream {
        #[pin]
        receiver: Receiver<Vec<ChangeEvent>>,
    }
}

impl Stream for ChangeStream {
    type Item = Vec<ChangeEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().receiver.poll_next(cx)
    }
}

/// Fan-out of change batches to every live subscriber.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    inner: Mutex<SubscriberList>,
}

#[derive(Debug, Default)]
struct SubscriberList {
    senders: Vec<Sender<Vec<ChangeEvent>>>,
    closed: bool,
}

impl Subscribers {
    /// Registers a new stream. After [`Subscribers::close`] the stream is
    /// already ended.
    pub(crate) fn subscribe(&self) -> ChangeStream {
        let (sender, receiver) = async_channel::unbounded();
        let mut list = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if list.closed {
            sender.close();
        } else {
            list.senders.push(sender);
        }
        ChangeStream { receiver }
    }

    /// Sends `batch` to every subscriber, forgetting dropped ones.
    pub(crate) fn publish(&self, batch: &[ChangeEvent]) {
        let mut list = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        list.senders
            .retain(|sender| sender.try_send(batch.to_vec()).is_ok());
    }

    /// Ends every stream and rejects future subscribers.
    pub(crate) fn close(&self) {
        let mut list = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        list.closed = true;
        for sender in list.senders.drain(..) {
            sender.close();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .senders
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn event(id: &str) -> ChangeEvent {
        ChangeEvent {
            view_id: NodeId::from(id),
            indices: vec![0, 1],
            patch: Patch::default(),
        }
    }

    #[test]
    fn every_subscriber_sees_every_batch() {
        let subscribers = Subscribers::default();
        let mut first = subscribers.subscribe();
        let mut second = subscribers.subscribe();

        subscribers.publish(&[event("a"), event("b")]);
        subscribers.close();

        smol::block_on(async {
            assert_eq!(first.next().await.map(|batch| batch.len()), Some(2));
            assert_eq!(second.next().await.map(|batch| batch.len()), Some(2));
            assert!(first.next().await.is_none());
        });
    }

    #[test]
    fn dropped_subscribers_are_forgotten() {
        let subscribers = Subscribers::default();
        drop(subscribers.subscribe());
        subscribers.publish(&[event("a")]);
        assert_eq!(subscribers.len(), 0);
    }

    #[test]
    fn serializes_with_transport_field_names() {
        let json = serde_json::to_value(event("abc")).unwrap();
        assert_eq!(json["viewId"], "abc");
        assert_eq!(json["widgetIndices"], serde_json::json!([0, 1]));
        assert_eq!(json["patch"], serde_json::json!([]));
    }

    #[test]
    fn subscribing_after_close_yields_an_ended_stream() {
        let subscribers = Subscribers::default();
        subscribers.close();
        let mut stream = subscribers.subscribe();
        assert!(smol::block_on(stream.next()).is_none());
        assert_eq!(subscribers.len(), 0);
    }
}
