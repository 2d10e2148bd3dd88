use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::ChangeEvent;

/// Consumer side of a watch session.
///
/// Yields events in store order and ends when the producing task exits. Dropping the
/// stream makes the producing task stop as well.
#[derive(Debug)]
pub struct ChangeStream {
    inner: ReceiverStream<ChangeEvent>,
}

impl ChangeStream {
    pub(crate) fn new(receiver: mpsc::Receiver<ChangeEvent>) -> Self {
        Self {
            inner: ReceiverStream::new(receiver),
        }
    }

    /// A finished stream that replays `events`; used to stand in for a backend.
    pub fn from_events(events: Vec<ChangeEvent>) -> Self {
        let (sender, receiver) = mpsc::channel(events.len().max(1));
        for event in events {
            // capacity covers every event
            let _ = sender.try_send(event);
        }
        Self::new(receiver)
    }

    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.inner.next().await
    }
}

impl Stream for ChangeStream {
    type Item = ChangeEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
