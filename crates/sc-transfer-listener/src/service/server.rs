//! Transfer listener server
//!
//! Owns the lifecycle (`Created -> Listening -> Stopped`) and the accept loop.
//! The loop hands every accepted connection to the worker pool and goes
//! straight back to `accept()`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapters::codec::BincodeTransferCodec;
use crate::domain::{AdmissionPolicy, ListenerConfig, ListenerState, TransferPayload};
use crate::error::{CloseError, ConnectionError, FailureKind, ListenerError};
use crate::metrics::{ListenerMetrics, MetricsRecorder, MetricsSnapshot};
use crate::ports::{TransferCodec, TransferListenerApi, TransferSink};
use crate::service::connection::ConnectionHandler;
use crate::service::pool::WorkerPool;

/// Inbound transfer listener
///
/// ## Example
///
/// ```ignore
/// let (sink, mut incoming) = ChannelTransferSink::<String, Vec<u8>>::bounded(1024, None);
/// let mut server = TransferServer::new(ListenerConfig::for_port(7070), Arc::new(sink));
/// let addr = server.start().await?;
///
/// while let Some(transfer) = incoming.recv().await {
///     // apply to the local cache
/// }
///
/// server.stop().await?;
/// ```
pub struct TransferServer<K, V> {
    config: ListenerConfig,
    sink: Arc<dyn TransferSink<K, V>>,
    codec: Arc<dyn TransferCodec<K, V>>,
    metrics: Arc<ListenerMetrics>,
    recorder: Arc<dyn MetricsRecorder>,
    pool: Arc<WorkerPool>,
    state: ListenerState,
    local_addr: Option<SocketAddr>,
    listening: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    accept_task: Option<JoinHandle<()>>,
}

impl<K, V> TransferServer<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    /// Create a listener; no socket is opened until `start`.
    pub fn new(config: ListenerConfig, sink: Arc<dyn TransferSink<K, V>>) -> Self {
        let pool = Arc::new(WorkerPool::new(config.admission));
        let metrics = Arc::new(ListenerMetrics::new());
        Self {
            config,
            sink,
            codec: Arc::new(BincodeTransferCodec::new()),
            recorder: metrics.clone(),
            metrics,
            pool,
            state: ListenerState::Created,
            local_addr: None,
            listening: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            accept_task: None,
        }
    }

    /// Create a listener on `port` with default settings and start it.
    pub async fn bind(port: u16, sink: Arc<dyn TransferSink<K, V>>) -> Result<Self, ListenerError> {
        let mut server = Self::new(ListenerConfig::for_port(port), sink);
        server.start().await?;
        Ok(server)
    }

    /// Replace the codec. Only takes effect before `start`.
    pub fn with_codec(mut self, codec: Arc<dyn TransferCodec<K, V>>) -> Self {
        self.codec = codec;
        self
    }

    /// Share an externally owned metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<ListenerMetrics>) -> Self {
        self.recorder = metrics.clone();
        self.metrics = metrics;
        self
    }

    /// Send listener events to `recorder` instead of the built-in counters.
    ///
    /// [`metrics`](Self::metrics) then stays at zero. Pass
    /// [`NoOpMetrics`](crate::metrics::NoOpMetrics) to disable recording.
    pub fn with_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Connections currently being handled by a worker
    pub fn active_connections(&self) -> usize {
        self.pool.active_workers()
    }
}

#[async_trait]
impl<K, V> TransferListenerApi for TransferServer<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    async fn start(&mut self) -> Result<SocketAddr, ListenerError> {
        if !self.state.can_transition_to(ListenerState::Listening) {
            return Err(ListenerError::InvalidState {
                state: self.state,
                operation: "start",
            });
        }
        self.config.validate()?;

        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;

        let handler = ConnectionHandler::new(
            Arc::clone(&self.sink),
            Arc::clone(&self.codec),
            Arc::clone(&self.recorder),
            self.config.max_transfer_bytes,
            self.config.read_timeout,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.listening.store(true, Ordering::Release);
        let accept_loop = AcceptLoop {
            listener,
            handler,
            pool: Arc::clone(&self.pool),
            metrics: Arc::clone(&self.recorder),
            listening: Arc::clone(&self.listening),
            next_connection_id: 1,
        };
        self.accept_task = Some(tokio::spawn(accept_loop.run(shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        self.local_addr = Some(local_addr);
        self.state = ListenerState::Listening;

        info!(
            %local_addr,
            codec = self.codec.name(),
            admission = ?self.config.admission,
            "Transfer listener started"
        );
        Ok(local_addr)
    }

    async fn stop(&mut self) -> Result<(), ListenerError> {
        if !self.state.can_transition_to(ListenerState::Stopped) {
            return Err(CloseError::NotListening { state: self.state }.into());
        }

        self.signal_shutdown();
        self.state = ListenerState::Stopped;

        if let Some(task) = self.accept_task.take() {
            task.await.map_err(|e| CloseError::AcceptTask(e.to_string()))?;
        }

        info!(
            local_addr = ?self.local_addr,
            in_flight = self.pool.active_workers(),
            "Transfer listener stopped"
        );
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn state(&self) -> ListenerState {
        self.state
    }

    /// `false` once the accept loop has exited, even before `stop`.
    ///
    /// A socket failure ends the loop but leaves `state()` at `Listening`
    /// until `stop` is called, which is still required to reach `Stopped`.
    fn is_listening(&self) -> bool {
        self.state == ListenerState::Listening && self.listening.load(Ordering::Acquire)
    }
}

impl<K, V> TransferServer<K, V> {
    fn signal_shutdown(&mut self) {
        self.listening.store(false, Ordering::Release);
        if let Some(tx) = self.shutdown_tx.take() {
            // The accept task may already be gone
            let _ = tx.send(true);
        }
    }
}

impl<K, V> Drop for TransferServer<K, V> {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

/// State owned by the accept task; the listening socket never leaves it.
struct AcceptLoop<K, V> {
    listener: TcpListener,
    handler: ConnectionHandler<K, V>,
    pool: Arc<WorkerPool>,
    metrics: Arc<dyn MetricsRecorder>,
    listening: Arc<AtomicBool>,
    next_connection_id: u64,
}

impl<K, V> AcceptLoop<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            // Queue admission waits for a slot before accepting, leaving
            // further clients in the kernel backlog.
            let reserved = match self.pool.policy() {
                AdmissionPolicy::Queue { .. } => tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    permit = self.pool.admit() => permit,
                },
                _ => None,
            };

            let accepted = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) if is_connection_scoped(&e) => {
                    let err = ConnectionError::Accept(e);
                    self.metrics.record_failure(FailureKind::Accept);
                    warn!(error = %err, "Dropped half-open connection");
                    continue;
                }
                Err(e) => {
                    let err = ConnectionError::Accept(e);
                    self.metrics.record_failure(FailureKind::Accept);
                    error!(error = %err, "Listening socket failed, accept loop terminating");
                    break;
                }
            };

            self.metrics.record_connection_accepted();
            let connection_id = self.next_connection_id;
            self.next_connection_id += 1;

            let permit = match reserved {
                Some(permit) => Some(permit),
                None => self.pool.admit().await,
            };
            let Some(permit) = permit else {
                self.metrics.record_connection_rejected();
                warn!(
                    connection_id,
                    %peer,
                    active = self.pool.active_workers(),
                    "Connection rejected, worker pool at capacity"
                );
                drop(stream);
                continue;
            };

            debug!(connection_id, %peer, "Accepted connection");
            let handler = self.handler.clone();
            self.pool.submit(permit, async move {
                // Outcome already logged and counted by the handler
                let _ = handler.handle(stream, peer, connection_id).await;
            });
        }

        self.listening.store(false, Ordering::Release);
        debug!("Accept loop exited");
    }
}

/// Errors that concern one client's handshake, not the listening socket
fn is_connection_scoped(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
