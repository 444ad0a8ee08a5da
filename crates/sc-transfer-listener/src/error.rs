//! Error types for the transfer listener
//!
//! Only [`ListenerError`] ever reaches a caller. Everything that happens on a
//! single connection is a [`ConnectionError`]: it is logged, counted and then
//! dropped together with the connection.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::domain::ListenerState;

/// Errors surfaced by the listener lifecycle
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind transfer listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to close transfer listener: {0}")]
    Close(#[from] CloseError),

    #[error("Cannot {operation} a listener in state {state}")]
    InvalidState {
        state: ListenerState,
        operation: &'static str,
    },

    #[error("Invalid listener configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Errors raised while closing the listening socket
#[derive(Debug, Error)]
pub enum CloseError {
    /// `stop` was called on a listener that is not listening (e.g. a second `stop`).
    #[error("Listener is not listening (state: {state})")]
    NotListening { state: ListenerState },

    #[error("Accept loop terminated abnormally: {0}")]
    AcceptTask(String),
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_transfer_bytes must be between 1 and {max}, got {value}")]
    InvalidTransferLimit { value: usize, max: usize },

    #[error("max_connections must be greater than 0")]
    ZeroConnectionLimit,

    #[error("read timeout must be greater than 0")]
    ZeroReadTimeout,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Failures confined to a single accepted connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("Deserialization failed: {0}")]
    Deserialization(#[from] CodecError),

    #[error("Delivery to transfer sink failed: {0}")]
    Delivery(#[from] SinkError),

    #[error("Sending confirmation failed: {0}")]
    Reply(#[source] io::Error),

    #[error("Closing connection failed: {0}")]
    Close(#[source] io::Error),

    #[error("No transfer received within {0:?}")]
    ReadTimeout(Duration),
}

/// Coarse classification of connection failures, used for metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Accept,
    Deserialization,
    Delivery,
    Reply,
    Close,
    Timeout,
}

impl ConnectionError {
    /// Metrics bucket for this failure
    pub fn kind(&self) -> FailureKind {
        match self {
            ConnectionError::Accept(_) => FailureKind::Accept,
            ConnectionError::Deserialization(_) => FailureKind::Deserialization,
            ConnectionError::Delivery(_) => FailureKind::Delivery,
            ConnectionError::Reply(_) => FailureKind::Reply,
            ConnectionError::Close(_) => FailureKind::Close,
            ConnectionError::ReadTimeout(_) => FailureKind::Timeout,
        }
    }
}

/// Errors from framing and payload (de)serialization
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer closed the connection before sending a single byte.
    #[error("Connection closed before any data was received")]
    EmptyStream,

    #[error("Frame declares an empty payload")]
    EmptyFrame,

    #[error("Stream ended early: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    #[error("Frame too large: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Malformed transfer container: {0}")]
    Malformed(String),

    #[error("Failed to encode transfer container: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors returned by a transfer sink
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Receiving queue is closed")]
    Closed,

    #[error("Receiving queue is full")]
    Full,

    #[error("Timed out enqueueing transfer after {0:?}")]
    Timeout(Duration),

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// Errors from the sending side of the protocol
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The listener closed the connection without the confirmation token.
    #[error("Transfer not acknowledged (reply: {reply:?})")]
    NotAcknowledged { reply: Vec<u8> },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
