//! Sending side of the transfer protocol
//!
//! Used by peers pushing entries into a remote cache, and by the tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::adapters::codec::BincodeTransferCodec;
use crate::adapters::framing::{read_reply, write_frame};
use crate::domain::protocol::is_acknowledgement;
use crate::domain::{TransferContainer, TransferPayload};
use crate::error::ClientError;
use crate::ports::TransferCodec;

/// One-shot transfer client: one connection per container.
pub struct TransferClient<K, V> {
    codec: Arc<dyn TransferCodec<K, V>>,
    connect_timeout: Option<Duration>,
    reply_timeout: Option<Duration>,
}

impl<K, V> TransferClient<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    /// Client using the default bincode codec and no timeouts
    pub fn new() -> Self {
        Self::with_codec(Arc::new(BincodeTransferCodec::new()))
    }

    /// Client using `codec`; must match the listener's codec
    pub fn with_codec(codec: Arc<dyn TransferCodec<K, V>>) -> Self {
        Self {
            codec,
            connect_timeout: None,
            reply_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    /// Send one container and wait for the confirmation.
    ///
    /// Succeeds only when the listener answers with exactly `OK`. An empty
    /// reply means the listener dropped the transfer.
    pub async fn send(&self, addr: SocketAddr, container: &TransferContainer<K, V>) -> Result<(), ClientError> {
        let payload = self.codec.encode(container)?;

        let connect = TcpStream::connect(addr);
        let connected = match self.connect_timeout {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => connect.await,
        };
        let mut stream = connected.map_err(|source| ClientError::Connect { addr, source })?;

        write_frame(&mut stream, &payload).await?;
        debug!(%addr, transfer_id = %container.transfer_id(), bytes = payload.len(), "Transfer sent");

        let reply = match self.reply_timeout {
            Some(limit) => timeout(limit, read_reply(&mut stream))
                .await
                .map_err(|_| ClientError::Timeout(limit))??,
            None => read_reply(&mut stream).await?,
        };

        if is_acknowledgement(&reply) {
            Ok(())
        } else {
            Err(ClientError::NotAcknowledged { reply })
        }
    }
}

impl<K, V> Default for TransferClient<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    fn default() -> Self {
        Self::new()
    }
}
