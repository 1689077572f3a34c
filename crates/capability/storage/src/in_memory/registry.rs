//! 链路注册表内存实现（用于测试与单实例部署）。
//!
//! 与 Redis 实现保持同一语义：记录带 TTL，实例索引随 store/remove 维护。

use crate::error::StorageError;
use crate::registry::LinkRegistry;
use domain::ConnectionRecord;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    record: ConnectionRecord,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct State {
    links: HashMap<String, Entry>,
    instances: HashMap<String, BTreeSet<String>>,
}

impl State {
    fn unindex(&mut self, instance_id: &str, device_id: &str) {
        if let Some(set) = self.instances.get_mut(instance_id) {
            set.remove(device_id);
            if set.is_empty() {
                self.instances.remove(instance_id);
            }
        }
    }

    fn live(&mut self, device_id: &str, now: Instant) -> Option<&mut Entry> {
        let expired = self
            .links
            .get(device_id)
            .map(|entry| entry.is_expired(now))
            .unwrap_or(false);
        if expired {
            if let Some(entry) = self.links.remove(device_id) {
                self.unindex(&entry.record.instance_id, device_id);
            }
            return None;
        }
        self.links.get_mut(device_id)
    }
}

pub struct InMemoryLinkRegistry {
    ttl: Duration,
    state: RwLock<State>,
}

impl InMemoryLinkRegistry {
    pub fn new(ttl_seconds: u64) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_seconds.max(1)))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for InMemoryLinkRegistry {
    fn default() -> Self {
        Self::new(3600)
    }
}

#[async_trait::async_trait]
impl LinkRegistry for InMemoryLinkRegistry {
    async fn store(&self, record: &ConnectionRecord) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let previous = state
            .links
            .get(&record.device_id)
            .map(|entry| entry.record.instance_id.clone());
        if let Some(previous) = previous {
            if previous != record.instance_id {
                state.unindex(&previous, &record.device_id);
            }
        }
        state.links.insert(
            record.device_id.clone(),
            Entry {
                record: record.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        state
            .instances
            .entry(record.instance_id.clone())
            .or_default()
            .insert(record.device_id.clone());
        Ok(())
    }

    async fn heartbeat(
        &self,
        device_id: &str,
        ts_ms: i64,
    ) -> Result<ConnectionRecord, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let ttl = self.ttl;
        let now = Instant::now();
        let Some(entry) = state.live(device_id, now) else {
            return Err(StorageError::not_found(format!(
                "link not registered: {}",
                device_id
            )));
        };
        entry.record.last_heartbeat_ms = ts_ms;
        entry.expires_at = now + ttl;
        let record = entry.record.clone();
        state
            .instances
            .entry(record.instance_id.clone())
            .or_default()
            .insert(record.device_id.clone());
        Ok(record)
    }

    async fn lookup(&self, device_id: &str) -> Result<Option<ConnectionRecord>, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(state
            .live(device_id, Instant::now())
            .map(|entry| entry.record.clone()))
    }

    async fn remove(&self, device_id: &str, instance_id: &str) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let owned = state
            .links
            .get(device_id)
            .map(|entry| entry.record.is_owned_by(instance_id))
            .unwrap_or(false);
        if owned {
            state.links.remove(device_id);
        }
        state.unindex(instance_id, device_id);
        Ok(())
    }

    async fn list_by_instance(&self, instance_id: &str) -> Result<Vec<String>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let now = Instant::now();
        Ok(state
            .instances
            .get(instance_id)
            .map(|set| {
                set.iter()
                    .filter(|device_id| {
                        state
                            .links
                            .get(device_id.as_str())
                            .is_some_and(|entry| !entry.is_expired(now))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_all(&self) -> Result<Vec<ConnectionRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let now = Instant::now();
        let mut items: Vec<ConnectionRecord> = state
            .links
            .values()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.record.clone())
            .collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn remove_if_stale(
        &self,
        device_id: &str,
        stale_before_ms: i64,
    ) -> Result<bool, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let stale = match state.links.get(device_id) {
            Some(entry) => entry.record.is_stale(stale_before_ms),
            None => return Ok(false),
        };
        if !stale {
            return Ok(false);
        }
        if let Some(entry) = state.links.remove(device_id) {
            state.unindex(&entry.record.instance_id, device_id);
        }
        Ok(true)
    }
}
