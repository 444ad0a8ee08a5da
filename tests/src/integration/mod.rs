//! Integration flows over loopback TCP.

pub mod listener_flows;
pub mod wire_protocol;
