//! # SC Transfer Listener
//!
//! Inbound side of entry transfers between Super-Cache nodes. A peer opens a
//! TCP connection, writes one framed Transfer Container, and gets `OK` back
//! once the container has been handed to the local receiving queue.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure types, no I/O
//!   - `TransferContainer`: key, value and transfer metadata
//!   - `ListenerConfig`: Configuration with validation and env loading
//!   - `ListenerState`: `Created -> Listening -> Stopped`
//!   - `protocol`: frame header and confirmation token
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `TransferListenerApi`: Driving port (lifecycle)
//!   - `TransferSink`: Driven port (receiving queue)
//!   - `TransferCodec`: Driven port (wire encoding)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `TransferServer`: Accept loop, implements `TransferListenerApi`
//!   - `ConnectionHandler`: One transfer per connection
//!   - `WorkerPool`: Worker tasks with admission policy
//!
//! - **Adapters Layer** (`adapters/`): External connections
//!   - `BincodeTransferCodec` / `JsonTransferCodec`
//!   - `ChannelTransferSink`: tokio mpsc receiving queue
//!   - `TransferClient`: Sending side of the protocol
//!
//! ## Protocol
//!
//! ```text
//! client -> server   [len: u32 BE][payload: len bytes]
//! server -> client   "OK"                (success only)
//! server             close               (always)
//! ```
//!
//! Any failure on a connection (bad frame, undecodable payload, queue
//! rejection) closes it without a reply. The sender treats a missing `OK` as
//! a failed transfer.
//!
//! ## Usage Example
//!
//! ```ignore
//! use sc_transfer_listener::{ChannelTransferSink, ListenerConfig, TransferListenerApi, TransferServer};
//! use std::sync::Arc;
//!
//! let (sink, mut incoming) = ChannelTransferSink::<String, Vec<u8>>::bounded(10_000, None);
//! let mut server = TransferServer::new(ListenerConfig::from_env()?, Arc::new(sink));
//! server.start().await?;
//!
//! tokio::spawn(async move {
//!     while let Some(transfer) = incoming.recv().await {
//!         let (key, value, _metadata) = transfer.into_parts();
//!         // apply to the local cache
//!     }
//! });
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports for convenience
pub use domain::{
    AdmissionPolicy, ListenerConfig, ListenerConfigBuilder, ListenerState, TransferContainer,
    TransferMetadata, TransferPayload, ACK_TOKEN,
};
pub use error::{
    ClientError, CloseError, CodecError, ConfigError, ConnectionError, FailureKind, ListenerError,
    SinkError,
};
pub use metrics::{ListenerMetrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{TransferCodec, TransferListenerApi, TransferSink};
pub use service::{ConnectionHandler, TransferServer, WorkerPool};

pub use adapters::{
    BincodeTransferCodec, ChannelTransferSink, IncomingTransfers, JsonTransferCodec, TransferClient,
};
