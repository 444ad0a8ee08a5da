//! Channel-backed transfer sink - the receiving queue
//!
//! The listener pushes into a [`ChannelTransferSink`]; the cache side drains
//! the matching [`IncomingTransfers`] at its own pace.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError, TrySendError};
use tracing::warn;

use crate::domain::{TransferContainer, TransferPayload};
use crate::error::SinkError;
use crate::ports::TransferSink;

/// Default receiving queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

enum QueueSender<K, V> {
    Bounded {
        sender: mpsc::Sender<TransferContainer<K, V>>,
        enqueue_timeout: Option<Duration>,
    },
    Unbounded(mpsc::UnboundedSender<TransferContainer<K, V>>),
}

enum QueueReceiver<K, V> {
    Bounded(mpsc::Receiver<TransferContainer<K, V>>),
    Unbounded(mpsc::UnboundedReceiver<TransferContainer<K, V>>),
}

/// Transfer sink feeding a tokio mpsc queue.
///
/// Bounded queues either reject immediately when full (no timeout) or wait up
/// to `enqueue_timeout` for a free slot.
pub struct ChannelTransferSink<K, V> {
    sender: QueueSender<K, V>,
}

/// Receiving end of a [`ChannelTransferSink`]
pub struct IncomingTransfers<K, V> {
    receiver: QueueReceiver<K, V>,
}

impl<K, V> ChannelTransferSink<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    /// Bounded queue of `capacity` transfers
    pub fn bounded(capacity: usize, enqueue_timeout: Option<Duration>) -> (Self, IncomingTransfers<K, V>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: QueueSender::Bounded {
                    sender,
                    enqueue_timeout,
                },
            },
            IncomingTransfers {
                receiver: QueueReceiver::Bounded(receiver),
            },
        )
    }

    /// Unbounded queue; never rejects while the receiver is alive
    pub fn unbounded() -> (Self, IncomingTransfers<K, V>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: QueueSender::Unbounded(sender),
            },
            IncomingTransfers {
                receiver: QueueReceiver::Unbounded(receiver),
            },
        )
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        match &self.sender {
            QueueSender::Bounded { sender, .. } => sender.is_closed(),
            QueueSender::Unbounded(sender) => sender.is_closed(),
        }
    }
}

#[async_trait]
impl<K, V> TransferSink<K, V> for ChannelTransferSink<K, V>
where
    K: TransferPayload,
    V: TransferPayload,
{
    async fn add_incoming_transfer(&self, container: TransferContainer<K, V>) -> Result<(), SinkError> {
        let transfer_id = container.transfer_id();
        let result = match &self.sender {
            QueueSender::Bounded {
                sender,
                enqueue_timeout: Some(timeout),
            } => sender
                .send_timeout(container, *timeout)
                .await
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => SinkError::Timeout(*timeout),
                    SendTimeoutError::Closed(_) => SinkError::Closed,
                }),
            QueueSender::Bounded {
                sender,
                enqueue_timeout: None,
            } => sender.try_send(container).map_err(|e| match e {
                TrySendError::Full(_) => SinkError::Full,
                TrySendError::Closed(_) => SinkError::Closed,
            }),
            QueueSender::Unbounded(sender) => sender.send(container).map_err(|_| SinkError::Closed),
        };

        if let Err(ref e) = result {
            warn!(%transfer_id, error = %e, "Receiving queue refused transfer");
        }
        result
    }
}

impl<K, V> IncomingTransfers<K, V> {
    /// Wait for the next transfer; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<TransferContainer<K, V>> {
        match &mut self.receiver {
            QueueReceiver::Bounded(receiver) => receiver.recv().await,
            QueueReceiver::Unbounded(receiver) => receiver.recv().await,
        }
    }

    /// Take a transfer if one is waiting
    pub fn try_recv(&mut self) -> Option<TransferContainer<K, V>> {
        let result = match &mut self.receiver {
            QueueReceiver::Bounded(receiver) => receiver.try_recv(),
            QueueReceiver::Unbounded(receiver) => receiver.try_recv(),
        };
        match result {
            Ok(container) => Some(container),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Stop accepting new transfers; queued ones can still be drained
    pub fn close(&mut self) {
        match &mut self.receiver {
            QueueReceiver::Bounded(receiver) => receiver.close(),
            QueueReceiver::Unbounded(receiver) => receiver.close(),
        }
    }
}
