//! An in-process publish/subscribe registry shared by both `Store`
//! implementations. Persistence and pub/sub are orthogonal concerns here:
//! RocksDB has no native pub/sub, so even the persistent store proxies
//! `publish`/`subscribe` through this same broadcast registry.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const CHANNEL_CAPACITY: usize = 256;

/// A live subscription to a channel. Wraps a `broadcast::Receiver` as a
/// `Stream` of payloads so the service binding can forward it straight
/// into an SSE response.
pub struct Subscription {
    inner: BroadcastStream<Vec<u8>>,
}

impl Subscription {
    fn new(receiver: broadcast::Receiver<Vec<u8>>) -> Self {
        Self { inner: BroadcastStream::new(receiver) }
    }
}

impl tokio_stream::Stream for Subscription {
    type Item = Vec<u8>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use tokio_stream::StreamExt;
        let this = self.get_mut();
        loop {
            return match std::pin::Pin::new(&mut this.inner).poll_next(cx) {
                std::task::Poll::Ready(Some(Ok(payload))) => std::task::Poll::Ready(Some(payload)),
                // A slow subscriber that falls behind the broadcast buffer
                // just skips ahead to the next message rather than erroring.
                std::task::Poll::Ready(Some(Err(_lagged))) => continue,
                std::task::Poll::Ready(None) => std::task::Poll::Ready(None),
                std::task::Poll::Pending => std::task::Poll::Pending,
            };
        }
    }
}

#[derive(Default)]
pub struct PubSubRegistry {
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl PubSubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, channel: &str, payload: &[u8]) {
        let mut channels = self.channels.lock().expect("pubsub registry lock poisoned");
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        // No subscribers is not an error: publishing is fire-and-forget.
        let _ = sender.send(payload.to_vec());
    }

    pub fn subscribe(&self, channel: &str) -> Subscription {
        let mut channels = self.channels.lock().expect("pubsub registry lock poisoned");
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Subscription::new(sender.subscribe())
    }
}
