//! Domain Layer
//!
//! Pure types and rules: no sockets, no tasks.

pub mod config;
pub mod container;
pub mod protocol;
pub mod state;

pub use config::{AdmissionPolicy, ListenerConfig, ListenerConfigBuilder};
pub use container::{TransferContainer, TransferMetadata, TransferPayload};
pub use protocol::ACK_TOKEN;
pub use state::ListenerState;
