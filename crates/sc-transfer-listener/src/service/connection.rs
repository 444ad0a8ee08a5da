//! Per-connection protocol: receive one transfer, deliver it, confirm, close.
//!
//! Every failure is terminal for the one connection only. The handler logs
//! it, counts it, and closes the stream; nothing propagates to the accept
//! loop or to other workers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

use crate::adapters::framing::read_frame;
use crate::domain::protocol::ACK_TOKEN;
use crate::domain::{TransferContainer, TransferPayload};
use crate::error::{CodecError, ConnectionError};
use crate::metrics::MetricsRecorder;
use crate::ports::{TransferCodec, TransferSink};

/// Handles one accepted connection at a time; cheap to clone per worker.
pub struct ConnectionHandler<K, V> {
    sink: Arc<dyn TransferSink<K, V>>,
    codec: Arc<dyn TransferCodec<K, V>>,
    metrics: Arc<dyn MetricsRecorder>,
    max_transfer_bytes: usize,
    read_timeout: Option<Duration>,
}

impl<K, V> Clone for ConnectionHandler<K, V> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            codec: Arc::clone(&self.codec),
            metrics: Arc::clone(&self.metrics),
            max_transfer_bytes: self.max_transfer_bytes,
            read_timeout: self.read_timeout,
        }
    }
}

impl<K, V> ConnectionHandler<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    pub fn new(
        sink: Arc<dyn TransferSink<K, V>>,
        codec: Arc<dyn TransferCodec<K, V>>,
        metrics: Arc<dyn MetricsRecorder>,
        max_transfer_bytes: usize,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            sink,
            codec,
            metrics,
            max_transfer_bytes,
            read_timeout,
        }
    }

    /// Run the protocol on `stream` and close it.
    ///
    /// The result is informational; by the time it is returned the failure
    /// has been logged and counted.
    pub async fn handle<S>(&self, mut stream: S, peer: SocketAddr, connection_id: u64) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        debug!(connection_id, %peer, "Session accepted");

        let result = self.process(&mut stream, connection_id).await;
        match &result {
            Ok(()) => {
                self.metrics.record_transfer_acknowledged(started.elapsed());
            }
            Err(e) => {
                self.metrics.record_failure(e.kind());
                match e {
                    // A peer that connects and leaves without sending is a probe, not a fault.
                    ConnectionError::Deserialization(CodecError::EmptyStream) => {
                        debug!(connection_id, %peer, "Peer closed connection without sending a transfer");
                    }
                    ConnectionError::Reply(_) => {
                        warn!(connection_id, %peer, error = %e, "Transfer delivered but confirmation failed");
                    }
                    _ => {
                        error!(connection_id, %peer, error = %e, kind = ?e.kind(), "Transfer dropped");
                    }
                }
            }
        }

        if let Err(e) = stream.shutdown().await {
            let err = ConnectionError::Close(e);
            self.metrics.record_failure(err.kind());
            debug!(connection_id, %peer, error = %err, "Connection close reported an error");
        }
        drop(stream);
        self.metrics.record_connection_closed();

        result
    }

    async fn process<S>(&self, stream: &mut S, connection_id: u64) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let container = self.receive(stream).await?;
        trace!(
            connection_id,
            transfer_id = %container.transfer_id(),
            origin = container.metadata().origin.as_deref().unwrap_or("-"),
            "Got transfer"
        );

        self.sink.add_incoming_transfer(container).await?;
        debug!(connection_id, "Put transfer to receiving queue");

        self.send_confirmation(stream).await?;
        debug!(connection_id, "Sent confirmation");
        Ok(())
    }

    async fn receive<S>(&self, stream: &mut S) -> Result<TransferContainer<K, V>, ConnectionError>
    where
        S: AsyncRead + Unpin + Send,
    {
        let payload = match self.read_timeout {
            Some(limit) => timeout(limit, read_frame(stream, self.max_transfer_bytes))
                .await
                .map_err(|_| ConnectionError::ReadTimeout(limit))??,
            None => read_frame(stream, self.max_transfer_bytes).await?,
        };

        let container = self.codec.decode(&payload)?;
        self.metrics.record_transfer_received(payload.len());
        Ok(container)
    }

    async fn send_confirmation<S>(&self, stream: &mut S) -> Result<(), ConnectionError>
    where
        S: AsyncWrite + Unpin + Send,
    {
        stream.write_all(ACK_TOKEN).await.map_err(ConnectionError::Reply)?;
        stream.flush().await.map_err(ConnectionError::Reply)
    }
}
