//! Boundary traits standing in for the Redis-backed config/state database
//! (`APPL_DB`/`STATE_DB`) the daemon talks to in production. [`MuxManager`]
//! is generic over these so the real adapter (backed by a KV store) and the
//! in-memory test double can be swapped without touching state-machine
//! logic.
//!
//! [`MuxManager`]: crate::mux_manager::MuxManager

use std::collections::HashMap;

/// A notification delivered by a [`KvSubscriber`]: one field of one key
/// changed (or the key was deleted, carried as an empty `fields` map).
#[derive(Debug, Clone)]
pub struct KvNotification {
    pub table: String,
    pub key: String,
    pub fields: HashMap<String, String>,
}

/// Synchronous read/write access to a single logical table (e.g. the
/// `MUX_CABLE` or `MUX_LINKMGR_TABLE` table).
pub trait KvTable: Send + Sync {
    fn get(&self, key: &str) -> Option<HashMap<String, String>>;
    fn set(&self, key: &str, fields: HashMap<String, String>);
    fn keys(&self) -> Vec<String>;
}

/// Asynchronous change notifications for a table, mirroring
/// `swss::SubscriberStateTable`.
#[async_trait::async_trait]
pub trait KvSubscriber: Send + Sync {
    async fn recv(&mut self) -> Option<KvNotification>;
}
