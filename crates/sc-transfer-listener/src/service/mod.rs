//! Service Layer
//!
//! - `server` - `TransferServer`, implements `TransferListenerApi`
//! - `connection` - per-connection receive/deliver/confirm protocol
//! - `pool` - worker tasks and admission

pub mod connection;
pub mod pool;
pub mod server;

pub use connection::ConnectionHandler;
pub use pool::{WorkerPermit, WorkerPool};
pub use server::TransferServer;
