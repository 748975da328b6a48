// Transport: the pub-sub broker a subscriber receives requests from and
// publishes results to.

pub mod memory;

pub use memory::{MemoryTransport, PublishedMessage};

use anyhow::Result;
use async_trait::async_trait;
use sensu_common::TransportSettings;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A pub-sub broker connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind `subscription` with consumer tag `funnel` and forward every
    /// inbound message to `out`.
    ///
    /// Blocks for the life of one connection. Returns `Ok(())` once `stop` is
    /// cancelled, or an error when the connection is lost; callers resubscribe
    /// on return.
    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
        funnel: &str,
        out: mpsc::Sender<Vec<u8>>,
        stop: CancellationToken,
    ) -> Result<()>;

    /// Publish `payload`. Best effort: the broker gives no delivery guarantee.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        extra: &str,
        payload: Vec<u8>,
    ) -> Result<()>;
}

/// Configuration name of [`MemoryTransport`].
pub const MEMORY_TRANSPORT: &str = "memory";

/// Build the transport named in the configuration.
pub fn build_transport(settings: &TransportSettings) -> Result<Arc<dyn Transport>> {
    match settings.name.as_str() {
        MEMORY_TRANSPORT => Ok(Arc::new(MemoryTransport::new())),
        other => Err(anyhow::anyhow!("unknown transport '{}'", other)),
    }
}
