//! Inbound Ports (Driving Ports)
//!
//! The lifecycle API the embedding application drives.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::domain::ListenerState;
use crate::error::ListenerError;

/// Transfer listener lifecycle (Driving Port)
#[async_trait]
pub trait TransferListenerApi: Send {
    /// Bind the configured port and start the accept loop.
    ///
    /// Returns the bound address. Fails with [`ListenerError::Bind`] when the
    /// port cannot be bound, and with [`ListenerError::InvalidState`] unless
    /// the listener is freshly created.
    async fn start(&mut self) -> Result<SocketAddr, ListenerError>;

    /// Close the listening socket and end the accept loop.
    ///
    /// Connections already accepted run to completion. Only valid while
    /// listening: a second call returns [`ListenerError::Close`].
    async fn stop(&mut self) -> Result<(), ListenerError>;

    /// Address the socket is bound to, once listening
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Current lifecycle state
    fn state(&self) -> ListenerState;

    /// Whether the accept loop is still running
    fn is_listening(&self) -> bool;
}
