//! # Super-Cache Node
//!
//! Wires the transfer listener to a [`LocalStore`].
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from env
//! 2. Create the receiving queue and the listener around it
//! 3. Bind the listener
//! 4. Spawn the consumer applying queued transfers to the store
//!
//! Shutdown runs the other way: the listener stops accepting, then the
//! consumer drains what is left in the queue and exits.

pub mod store;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sc_transfer_listener::{
    adapters::DEFAULT_QUEUE_CAPACITY, ChannelTransferSink, IncomingTransfers, ListenerConfig,
    ListenerState, MetricsSnapshot, TransferContainer, TransferListenerApi, TransferServer,
};

pub use crate::store::LocalStore;

/// Node configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub listener: ListenerConfig,
    /// Receiving queue capacity
    pub queue_capacity: usize,
    /// How long a connection may wait for queue space; `None` rejects at once
    pub enqueue_timeout: Option<Duration>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enqueue_timeout: None,
        }
    }
}

impl NodeConfig {
    /// Load from the environment.
    ///
    /// Listener variables as in [`ListenerConfig::from_env`], plus
    /// `SC_QUEUE_CAPACITY` (default 10000) and `SC_ENQUEUE_TIMEOUT_MS`
    /// (default: reject when full).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listener = ListenerConfig::from_lookup(&lookup).context("Invalid listener configuration")?;

        let queue_capacity = match lookup("SC_QUEUE_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("SC_QUEUE_CAPACITY must be a positive integer, got {raw:?}"))?,
            None => DEFAULT_QUEUE_CAPACITY,
        };

        let enqueue_timeout = match lookup("SC_ENQUEUE_TIMEOUT_MS") {
            Some(raw) => Some(Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("SC_ENQUEUE_TIMEOUT_MS must be milliseconds, got {raw:?}"))?,
            )),
            None => None,
        };

        Ok(Self {
            listener,
            queue_capacity,
            enqueue_timeout,
        })
    }
}

/// A running cache node
pub struct CacheNode {
    server: TransferServer<String, Vec<u8>>,
    store: LocalStore,
    incoming: Option<IncomingTransfers<String, Vec<u8>>>,
    consumer: Option<JoinHandle<u64>>,
    shutdown_tx: watch::Sender<bool>,
}

impl CacheNode {
    pub fn new(config: NodeConfig) -> Self {
        let (sink, incoming) = ChannelTransferSink::bounded(config.queue_capacity, config.enqueue_timeout);
        let server = TransferServer::new(config.listener, Arc::new(sink));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            server,
            store: LocalStore::new(),
            incoming: Some(incoming),
            consumer: None,
            shutdown_tx,
        }
    }

    /// Bind the listener and start applying transfers.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let incoming = self
            .incoming
            .take()
            .ok_or_else(|| anyhow!("Cache node already started"))?;

        let addr = self.server.start().await.context("Failed to start transfer listener")?;

        let store = self.store.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.consumer = Some(tokio::spawn(consume(incoming, store, shutdown_rx)));

        info!(%addr, "Cache node ready");
        Ok(addr)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn listener_metrics(&self) -> MetricsSnapshot {
        self.server.metrics()
    }

    pub fn listener_state(&self) -> ListenerState {
        self.server.state()
    }

    /// Stop accepting transfers, then drain the queue.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        // Also after the accept loop died on its own: only stop() reaches Stopped
        if self.server.state() == ListenerState::Listening {
            self.server.stop().await.context("Failed to stop transfer listener")?;
        }

        if self.shutdown_tx.send(true).is_err() {
            debug!("Consumer already gone");
        }
        if let Some(consumer) = self.consumer.take() {
            let applied = consumer.await.context("Consumer task failed")?;
            info!(applied, entries = self.store.len(), "Consumer stopped");
        }

        let metrics = self.server.metrics();
        info!(
            accepted = metrics.connections_accepted,
            acknowledged = metrics.transfers_acknowledged,
            dropped = metrics.deserialization_failures + metrics.delivery_failures,
            "Shutdown complete"
        );
        Ok(())
    }
}

/// Apply queued transfers until shutdown, then drain what is left.
async fn consume(
    mut incoming: IncomingTransfers<String, Vec<u8>>,
    store: LocalStore,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut applied = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            next = incoming.recv() => match next {
                Some(transfer) => {
                    apply(&store, transfer);
                    applied += 1;
                }
                None => {
                    warn!("Receiving queue closed");
                    return applied;
                }
            },
        }
    }

    incoming.close();
    while let Some(transfer) = incoming.try_recv() {
        apply(&store, transfer);
        applied += 1;
    }
    applied
}

fn apply(store: &LocalStore, transfer: TransferContainer<String, Vec<u8>>) {
    let transfer_id = transfer.transfer_id();
    let origin = transfer.metadata().origin.clone();
    let replaced = store.apply(transfer);
    debug!(
        %transfer_id,
        origin = origin.as_deref().unwrap_or("-"),
        replaced = replaced.is_some(),
        "Applied transfer"
    );
}
