//! Outbound Ports (Driven Ports)
//!
//! What the listener needs from the embedding system: somewhere to put
//! incoming transfers, and a way to turn bytes into containers.

use async_trait::async_trait;

use crate::domain::{TransferContainer, TransferPayload};
use crate::error::{CodecError, SinkError};

/// Consumer of incoming transfers (Driven Port)
///
/// Called concurrently from every connection worker, so implementations must
/// be thread-safe. A call should return quickly; it may wait a bounded time
/// for queue capacity, but never indefinitely. An `Err` makes the listener
/// drop the connection without acknowledging it.
#[async_trait]
pub trait TransferSink<K, V>: Send + Sync
where
    K: TransferPayload,
    V: TransferPayload,
{
    /// Enqueue one received container for later application to the cache
    async fn add_incoming_transfer(&self, container: TransferContainer<K, V>) -> Result<(), SinkError>;
}

/// Payload codec (Driven Port)
///
/// Converts between a container and the bytes inside one frame. Framing
/// itself is not the codec's concern.
pub trait TransferCodec<K, V>: Send + Sync {
    /// Serialize a container into a frame payload
    fn encode(&self, container: &TransferContainer<K, V>) -> Result<Vec<u8>, CodecError>;

    /// Deserialize a frame payload into a container
    fn decode(&self, payload: &[u8]) -> Result<TransferContainer<K, V>, CodecError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
