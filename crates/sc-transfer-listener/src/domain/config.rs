//! Listener configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use sc_transfer_listener::domain::{AdmissionPolicy, ListenerConfigBuilder};
//!
//! let config = ListenerConfigBuilder::new()
//!     .port(7070)
//!     .admission(AdmissionPolicy::Reject { max_connections: 512 })
//!     .max_transfer_bytes(4 * 1024 * 1024)
//!     .build()
//!     .expect("Valid config");
//! ```

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::domain::protocol::{DEFAULT_MAX_TRANSFER_BYTES, MAX_TRANSFER_BYTES_LIMIT};
use crate::error::ConfigError;

/// Default listening port
pub const DEFAULT_PORT: u16 = 7070;

/// Connection limit used when a bounded policy is picked without a number
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// What the worker pool does once it is running at capacity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AdmissionPolicy {
    /// Spawn a worker for every connection, no cap
    #[default]
    Unbounded,
    /// Close connections beyond `max_connections` immediately, without a reply
    Reject { max_connections: usize },
    /// Stop accepting until one of `max_connections` workers frees up
    Queue { max_connections: usize },
}

impl AdmissionPolicy {
    /// Concurrency cap, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        match self {
            AdmissionPolicy::Unbounded => None,
            AdmissionPolicy::Reject { max_connections }
            | AdmissionPolicy::Queue { max_connections } => Some(*max_connections),
        }
    }

    fn parse(name: &str, max_connections: usize) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "unbounded" | "cached" => Some(AdmissionPolicy::Unbounded),
            "reject" => Some(AdmissionPolicy::Reject { max_connections }),
            "queue" => Some(AdmissionPolicy::Queue { max_connections }),
            _ => None,
        }
    }
}

/// Transfer listener configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Interface to bind
    pub bind_address: IpAddr,
    /// Port to bind; 0 asks the OS for an ephemeral port
    pub port: u16,
    /// Worker pool admission policy
    pub admission: AdmissionPolicy,
    /// Largest accepted transfer payload in bytes
    pub max_transfer_bytes: usize,
    /// Time a peer gets to deliver its frame; `None` waits forever
    pub read_timeout: Option<Duration>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            admission: AdmissionPolicy::Unbounded,
            max_transfer_bytes: DEFAULT_MAX_TRANSFER_BYTES,
            read_timeout: None,
        }
    }
}

impl ListenerConfig {
    /// Default configuration on `port`
    pub fn for_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SC_LISTENER_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `SC_LISTENER_PORT`: Port (default: 7070)
    /// - `SC_ADMISSION`: `unbounded`, `reject` or `queue` (default: unbounded)
    /// - `SC_MAX_CONNECTIONS`: Cap for bounded policies (default: 1024)
    /// - `SC_MAX_TRANSFER_BYTES`: Payload limit (default: 16 MiB)
    /// - `SC_READ_TIMEOUT_MS`: Per-connection read timeout (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Configuration from an arbitrary key lookup, unset keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_address = parse_var(&lookup, "SC_LISTENER_BIND")?.unwrap_or(defaults.bind_address);
        let port = parse_var(&lookup, "SC_LISTENER_PORT")?.unwrap_or(defaults.port);
        let max_connections =
            parse_var(&lookup, "SC_MAX_CONNECTIONS")?.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let max_transfer_bytes =
            parse_var(&lookup, "SC_MAX_TRANSFER_BYTES")?.unwrap_or(defaults.max_transfer_bytes);
        let read_timeout = parse_var::<u64, _>(&lookup, "SC_READ_TIMEOUT_MS")?.map(Duration::from_millis);

        let admission = match lookup("SC_ADMISSION") {
            Some(name) => AdmissionPolicy::parse(&name, max_connections).ok_or(
                ConfigError::InvalidValue {
                    key: "SC_ADMISSION",
                    value: name,
                },
            )?,
            None => defaults.admission,
        };

        let config = Self {
            bind_address,
            port,
            admission,
            max_transfer_bytes,
            read_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transfer_bytes == 0 || self.max_transfer_bytes > MAX_TRANSFER_BYTES_LIMIT {
            return Err(ConfigError::InvalidTransferLimit {
                value: self.max_transfer_bytes,
                max: MAX_TRANSFER_BYTES_LIMIT,
            });
        }

        if self.admission.capacity() == Some(0) {
            return Err(ConfigError::ZeroConnectionLimit);
        }

        if self.read_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroReadTimeout);
        }

        Ok(())
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Builder-style method to set the interface
    pub fn with_bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    /// Builder-style method to set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder-style method to set the admission policy
    pub fn with_admission(mut self, admission: AdmissionPolicy) -> Self {
        self.admission = admission;
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(None),
    }
}

/// Builder for ListenerConfig with validation
#[derive(Default)]
pub struct ListenerConfigBuilder {
    bind_address: Option<IpAddr>,
    port: Option<u16>,
    admission: Option<AdmissionPolicy>,
    max_transfer_bytes: Option<usize>,
    read_timeout: Option<Duration>,
}

impl ListenerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_address(mut self, addr: IpAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn admission(mut self, admission: AdmissionPolicy) -> Self {
        self.admission = Some(admission);
        self
    }

    pub fn max_transfer_bytes(mut self, bytes: usize) -> Self {
        self.max_transfer_bytes = Some(bytes);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Build the ListenerConfig, validating all parameters
    pub fn build(self) -> Result<ListenerConfig, ConfigError> {
        let defaults = ListenerConfig::default();

        let config = ListenerConfig {
            bind_address: self.bind_address.unwrap_or(defaults.bind_address),
            port: self.port.unwrap_or(defaults.port),
            admission: self.admission.unwrap_or(defaults.admission),
            max_transfer_bytes: self.max_transfer_bytes.unwrap_or(defaults.max_transfer_bytes),
            read_timeout: self.read_timeout.or(defaults.read_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}
