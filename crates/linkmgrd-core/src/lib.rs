//! # linkmgrd-core
//!
//! Per-port composite state machine, ICMP heartbeat engine, and the
//! [`MuxManager`](mux_manager::MuxManager) orchestration loop for
//! `linkmgrd`: the per-ToR daemon that keeps each dual-ToR MUX cable
//! pointed at whichever ToR a server's traffic is actually reaching.
//!
//! ## Architecture
//!
//! Each [`Port`](port::Port) owns three independent sub-machines —
//! [`link_prober`] (debounced heartbeat classification),
//! [`mux_state`] (the cable's reported forwarding state), and
//! [`link_state`] (netdev carrier) — plus a
//! [`link_manager`] that reacts to their combined
//! [`CompositeState`](composite::CompositeState) by requesting switchovers.
//! Every port is reached only through a [`MuxManager`](mux_manager::MuxManager)
//! strand task, so state mutation is always single-threaded even though the
//! heartbeat engine and KV subscriber run concurrently.

pub mod composite;
pub mod config;
pub mod error;
pub mod guid;
pub mod heartbeat;
pub mod icmp;
pub mod kv;
pub mod link_manager;
pub mod link_prober;
pub mod link_state;
pub mod mac;
pub mod mux_manager;
pub mod mux_state;
pub mod port;
pub mod timer;

pub use composite::{CompositeState, Health};
pub use config::{GlobalConfig, LinkFailureDetectionType, Mode, PortCableType, PortConfig};
pub use error::{ConfigError, MuxManagerError, ProbeError};
pub use link_manager::{LinkManagerAction, SwitchCause};
pub use mux_manager::{MuxManager, MuxManagerHandle};
pub use port::Port;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
