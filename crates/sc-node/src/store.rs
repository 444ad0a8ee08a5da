//! In-memory entry store fed by the receiving queue.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sc_transfer_listener::TransferContainer;

/// Entries received from peers, keyed by cache key.
#[derive(Clone, Default)]
pub struct LocalStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a received transfer. Returns the value it replaced, if any.
    pub fn apply(&self, transfer: TransferContainer<String, Vec<u8>>) -> Option<Vec<u8>> {
        let (key, value, _metadata) = transfer.into_parts();
        self.entries.write().insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
