// In-process transport: subscriptions and published results live in memory.
// Used to embed the client without a broker and to drive subscribers in tests.

use super::Transport;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// A message recorded by `publish`.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub extra: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// The payload parsed as JSON.
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

struct Consumer {
    id: u64,
    funnel: String,
    out: mpsc::Sender<Vec<u8>>,
}

#[derive(Default)]
struct State {
    consumers: HashMap<String, Consumer>,
    published: Vec<PublishedMessage>,
    subscribe_count: usize,
    next_consumer_id: u64,
    connection: CancellationToken,
}

/// In-memory broker. One consumer per subscription; the latest subscribe wins.
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
    changed: Notify,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand `payload` to the consumer bound to `subscription`, waiting while
    /// the consumer is busy.
    pub async fn deliver(&self, subscription: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        let out = self
            .state
            .lock()
            .consumers
            .get(subscription)
            .map(|c| c.out.clone())
            .ok_or_else(|| anyhow!("no consumer bound to '{}'", subscription))?;
        out.send(payload.into())
            .await
            .map_err(|_| anyhow!("consumer of '{}' went away", subscription))
    }

    /// Drop every live connection, as a broker restart would.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        state.connection.cancel();
        state.connection = CancellationToken::new();
        state.consumers.clear();
        drop(state);
        self.changed.notify_waiters();
    }

    /// Messages published so far, in publish order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    /// Number of `subscribe` calls made so far.
    pub fn subscribe_count(&self) -> usize {
        self.state.lock().subscribe_count
    }

    /// Consumer tag currently bound to `subscription`.
    pub fn bound_funnel(&self, subscription: &str) -> Option<String> {
        self.state
            .lock()
            .consumers
            .get(subscription)
            .map(|c| c.funnel.clone())
    }

    /// Wait until at least `count` messages have been published.
    pub async fn wait_for_published(&self, count: usize) -> Vec<PublishedMessage> {
        loop {
            let notified = self.changed.notified();
            {
                let state = self.state.lock();
                if state.published.len() >= count {
                    return state.published.clone();
                }
            }
            notified.await;
        }
    }

    /// Wait until `subscription` has a bound consumer.
    pub async fn wait_for_consumer(&self, subscription: &str) {
        self.wait_for_subscribes(0, subscription).await;
    }

    /// Wait until more than `after` subscribe calls were made and
    /// `subscription` has a bound consumer.
    pub async fn wait_for_subscribes(&self, after: usize, subscription: &str) {
        loop {
            let notified = self.changed.notified();
            {
                let state = self.state.lock();
                if state.subscribe_count > after && state.consumers.contains_key(subscription) {
                    return;
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(
        &self,
        _topic: &str,
        subscription: &str,
        funnel: &str,
        out: mpsc::Sender<Vec<u8>>,
        stop: CancellationToken,
    ) -> Result<()> {
        let (id, connection) = {
            let mut state = self.state.lock();
            state.next_consumer_id += 1;
            state.subscribe_count += 1;
            let id = state.next_consumer_id;
            state.consumers.insert(
                subscription.to_string(),
                Consumer {
                    id,
                    funnel: funnel.to_string(),
                    out,
                },
            );
            (id, state.connection.clone())
        };
        self.changed.notify_waiters();

        let result = tokio::select! {
            _ = stop.cancelled() => Ok(()),
            _ = connection.cancelled() => Err(anyhow!("connection to memory broker lost")),
        };

        {
            let mut state = self.state.lock();
            if state.consumers.get(subscription).map(|c| c.id) == Some(id) {
                state.consumers.remove(subscription);
            }
        }
        self.changed.notify_waiters();

        result
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        extra: &str,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.state.lock().published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            extra: extra.to_string(),
            payload,
        });
        self.changed.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn delivers_to_bound_consumer() {
        let transport = Arc::new(MemoryTransport::new());
        let (tx, mut rx) = mpsc::channel(1);
        let stop = CancellationToken::new();

        let t = transport.clone();
        let s = stop.clone();
        let handle = tokio::spawn(async move { t.subscribe("#", "default", "host1-1-2", tx, s).await });

        tokio::time::timeout(WAIT, transport.wait_for_consumer("default"))
            .await
            .unwrap();
        assert_eq!(transport.bound_funnel("default").as_deref(), Some("host1-1-2"));

        transport.deliver("default", b"hello".to_vec()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"hello");

        stop.cancel();
        assert!(handle.await.unwrap().is_ok());
        assert!(transport.bound_funnel("default").is_none());
    }

    #[tokio::test]
    async fn deliver_without_consumer_fails() {
        let transport = MemoryTransport::new();
        assert!(transport.deliver("nobody", b"x".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn disconnect_ends_subscribe_with_error() {
        let transport = Arc::new(MemoryTransport::new());
        let (tx, _rx) = mpsc::channel(1);

        let t = transport.clone();
        let handle = tokio::spawn(async move {
            t.subscribe("#", "default", "f", tx, CancellationToken::new()).await
        });
        tokio::time::timeout(WAIT, transport.wait_for_consumer("default"))
            .await
            .unwrap();

        transport.disconnect();
        assert!(handle.await.unwrap().is_err());
        assert_eq!(transport.subscribe_count(), 1);
    }

    #[tokio::test]
    async fn publish_is_recorded_in_order() {
        let transport = MemoryTransport::new();
        transport.publish("direct", "results", "", b"{\"n\":1}".to_vec()).await.unwrap();
        transport.publish("direct", "results", "", b"{\"n\":2}".to_vec()).await.unwrap();

        let published = tokio::time::timeout(WAIT, transport.wait_for_published(2))
            .await
            .unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].exchange, "direct");
        assert_eq!(published[0].routing_key, "results");
        assert_eq!(published[1].json().unwrap()["n"], 2);
    }
}
