//! Ports Layer
//!
//! - Driving Ports (inbound) - lifecycle API for the embedding application
//! - Driven Ports (outbound) - transfer sink and payload codec

pub mod inbound;
pub mod outbound;

pub use inbound::TransferListenerApi;
pub use outbound::{TransferCodec, TransferSink};
