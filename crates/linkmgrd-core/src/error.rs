//! Typed error surfaces for the core crate.
//!
//! Fatal errors (socket/filter setup, missing required configuration,
//! allocation failure) propagate to `main` via `?` and cause a non-zero
//! exit. Everything else is logged and handled by back-off/retry inside
//! the state machines.

use std::net::AddrParseError;

use thiserror::Error;

/// Errors raised while building or mutating [`crate::config::PortConfig`] /
/// [`crate::config::GlobalConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration key missing: {0}")]
    MissingRequired(&'static str),

    #[error("malformed IPv4/IPv6 address for {field}: {source}")]
    BadAddress {
        field: &'static str,
        #[source]
        source: AddrParseError,
    },

    #[error("malformed MAC address for {field}: {value}")]
    BadMac { field: &'static str, value: String },

    #[error("server_id {0} is out of range for well-known MAC generation (must be < 1024)")]
    ServerIdOutOfRange(u32),
}

/// Errors raised by the heartbeat engine's socket/filter layer. These are
/// fatal at initialization time; transient failures during operation are
/// logged and retried, never surfaced as this type.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to open raw socket on {iface}: {source}")]
    SocketOpen {
        iface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind raw socket to {iface}: {source}")]
    SocketBind {
        iface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to attach BPF filter on {iface}: {source}")]
    FilterAttach {
        iface: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transient send failure, will retry next cycle: {0}")]
    TransientSend(std::io::Error),
}

/// Top-level errors surfaced by [`crate::mux_manager::MuxManager`].
#[derive(Debug, Error)]
pub enum MuxManagerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("probe initialization error: {0}")]
    Probe(#[from] ProbeError),

    #[error("port allocation failed for {0}")]
    PortAllocation(String),

    #[error("the MuxManager strand has already shut down")]
    StrandClosed,
}
