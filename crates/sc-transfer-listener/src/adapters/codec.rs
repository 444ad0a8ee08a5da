//! Codec adapters for transfer containers

use std::marker::PhantomData;

use crate::domain::{TransferContainer, TransferPayload};
use crate::error::CodecError;
use crate::ports::TransferCodec;

/// Default codec using bincode.
pub struct BincodeTransferCodec<K, V> {
    _payload: PhantomData<fn() -> (K, V)>,
}

impl<K, V> BincodeTransferCodec<K, V> {
    pub fn new() -> Self {
        Self { _payload: PhantomData }
    }
}

impl<K, V> Default for BincodeTransferCodec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TransferCodec<K, V> for BincodeTransferCodec<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    fn encode(&self, container: &TransferContainer<K, V>) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(container).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, payload: &[u8]) -> Result<TransferContainer<K, V>, CodecError> {
        bincode::deserialize(payload).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "bincode"
    }
}

/// JSON codec, for peers that cannot speak bincode and for debugging with
/// plain-text captures.
pub struct JsonTransferCodec<K, V> {
    _payload: PhantomData<fn() -> (K, V)>,
}

impl<K, V> JsonTransferCodec<K, V> {
    pub fn new() -> Self {
        Self { _payload: PhantomData }
    }
}

impl<K, V> Default for JsonTransferCodec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TransferCodec<K, V> for JsonTransferCodec<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    fn encode(&self, container: &TransferContainer<K, V>) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(container).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, payload: &[u8]) -> Result<TransferContainer<K, V>, CodecError> {
        serde_json::from_slice(payload).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
