//! In-process stand-in for the Redis-backed config/state database.
//!
//! Production `linkmgrd` talks to `APPL_DB`/`STATE_DB` through `swss`'s
//! `Table`/`SubscriberStateTable` wrappers. Driving that against a real
//! Redis instance is out of scope here; [`InMemoryKv`] implements the same
//! [`KvTable`]/[`KvSubscriber`] boundary linkmgrd-core depends on, backed by
//! a `RwLock<HashMap>` and a broadcast channel, so the orchestration logic
//! can be exercised end-to-end without one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use linkmgrd_core::kv::{KvNotification, KvSubscriber, KvTable};

/// Shared in-memory table plus a broadcast channel that fans out every
/// `set` call to however many subscribers are listening.
pub struct InMemoryKv {
    table_name: String,
    data: RwLock<HashMap<String, HashMap<String, String>>>,
    notify: broadcast::Sender<KvNotification>,
}

impl InMemoryKv {
    pub fn new(table_name: impl Into<String>) -> Arc<Self> {
        let (notify, _) = broadcast::channel(1024);
        Arc::new(Self {
            table_name: table_name.into(),
            data: RwLock::new(HashMap::new()),
            notify,
        })
    }

    pub fn subscribe(self: &Arc<Self>) -> InMemoryKvSubscriber {
        InMemoryKvSubscriber {
            rx: self.notify.subscribe(),
        }
    }
}

impl KvTable for InMemoryKv {
    fn get(&self, key: &str) -> Option<HashMap<String, String>> {
        self.data.read().expect("InMemoryKv poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, fields: HashMap<String, String>) {
        self.data
            .write()
            .expect("InMemoryKv poisoned")
            .insert(key.to_string(), fields.clone());
        let _ = self.notify.send(KvNotification {
            table: self.table_name.clone(),
            key: key.to_string(),
            fields,
        });
    }

    fn keys(&self) -> Vec<String> {
        self.data.read().expect("InMemoryKv poisoned").keys().cloned().collect()
    }
}

pub struct InMemoryKvSubscriber {
    rx: broadcast::Receiver<KvNotification>,
}

#[async_trait::async_trait]
impl KvSubscriber for InMemoryKvSubscriber {
    async fn recv(&mut self) -> Option<KvNotification> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("InMemoryKv subscriber lagged, dropped {skipped} notification(s)");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
