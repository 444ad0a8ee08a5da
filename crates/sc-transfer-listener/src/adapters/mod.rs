//! Adapters Layer
//!
//! - `codec` - bincode and JSON implementations of `TransferCodec`
//! - `framing` - length-prefixed frame I/O
//! - `sink` - tokio mpsc receiving queue implementing `TransferSink`
//! - `client` - sending side of the protocol

pub mod client;
pub mod codec;
pub mod framing;
pub mod sink;

pub use client::TransferClient;
pub use codec::{BincodeTransferCodec, JsonTransferCodec};
pub use sink::{ChannelTransferSink, IncomingTransfers, DEFAULT_QUEUE_CAPACITY};
