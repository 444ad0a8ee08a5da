//! Transfer container - the unit of data moved by one connection

use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bound for keys and values that can travel in a transfer container.
///
/// Anything serde can encode, that can cross task boundaries, qualifies.
pub trait TransferPayload: Serialize + DeserializeOwned + Send + 'static {}

impl<T> TransferPayload for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// Metadata attached to every transfer by the sending peer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    /// Unique transfer identifier (UUID v4)
    pub transfer_id: Uuid,
    /// Identifier of the sending node, if it chose to announce one
    pub origin: Option<String>,
    /// Creation time on the sender, unix milliseconds
    pub created_at_ms: u64,
}

impl TransferMetadata {
    /// Fresh metadata with a random id and the current time
    pub fn new() -> Self {
        Self {
            transfer_id: Uuid::new_v4(),
            origin: None,
            created_at_ms: now_millis(),
        }
    }

    /// Builder-style method to set the origin node
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl Default for TransferMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A key/value pair on its way into a remote cache.
///
/// Immutable once constructed; the receiving side consumes it exactly once
/// through [`TransferContainer::into_parts`] or by handing it to a sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferContainer<K, V> {
    key: K,
    value: V,
    metadata: TransferMetadata,
}

impl<K, V> TransferContainer<K, V> {
    /// Create a container with fresh metadata
    pub fn new(key: K, value: V) -> Self {
        Self::with_metadata(key, value, TransferMetadata::new())
    }

    /// Create a container with explicit metadata
    pub fn with_metadata(key: K, value: V, metadata: TransferMetadata) -> Self {
        Self {
            key,
            value,
            metadata,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn metadata(&self) -> &TransferMetadata {
        &self.metadata
    }

    /// Shorthand for `metadata().transfer_id`
    pub fn transfer_id(&self) -> Uuid {
        self.metadata.transfer_id
    }

    /// Consume the container
    pub fn into_parts(self) -> (K, V, TransferMetadata) {
        (self.key, self.value, self.metadata)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
