use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;

use crate::object::{ObjectMetadata, ObjectStore, StoredObject};
use crate::response::{CachedResponse, ResponseCache};

/// Process-local object store, used for tests and `storage.backend = "memory"`.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn put(&self, key: &str, body: Bytes, metadata: ObjectMetadata) -> Result<()> {
        self.objects
            .write()
            .insert(key.to_string(), StoredObject { body, metadata });
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut objects = self.objects.write();
        Ok(keys
            .iter()
            .filter(|key| objects.remove(key.as_str()).is_some())
            .count() as u64)
    }
}

/// Bounded in-memory edge cache.
///
/// Holds at most `max_entries` responses and `max_bytes` of bodies and
/// headers. Inserting past either bound evicts the oldest entries first;
/// an entry larger than the whole byte budget is not cached at all.
#[derive(Clone)]
pub struct MemoryResponseCache {
    inner: Arc<RwLock<Entries>>,
    max_entries: usize,
    max_bytes: usize,
}

#[derive(Default)]
struct Entries {
    by_key: HashMap<String, Slot>,
    /// Insertion sequence -> key, oldest first.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    bytes: usize,
}

struct Slot {
    seq: u64,
    size: usize,
    response: CachedResponse,
}

impl Entries {
    fn remove(&mut self, key: &str) -> Option<Slot> {
        let slot = self.by_key.remove(key)?;
        self.order.remove(&slot.seq);
        self.bytes -= slot.size;
        Some(slot)
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.order.pop_first() else {
            return false;
        };
        if let Some(slot) = self.by_key.remove(&key) {
            self.bytes -= slot.size;
        }
        true
    }
}

fn entry_size(key: &str, response: &CachedResponse) -> usize {
    key.len()
        + response.body.len()
        + response
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len())
            .sum::<usize>()
}

impl MemoryResponseCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Entries::default())),
            max_entries: max_entries.max(1),
            max_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_key.is_empty()
    }

    /// Bytes currently accounted against `max_bytes`.
    pub fn size_bytes(&self) -> usize {
        self.inner.read().bytes
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn lookup(&self, key: &str) -> Result<Option<CachedResponse>> {
        let now = Utc::now();
        Ok(self
            .inner
            .read()
            .by_key
            .get(key)
            .filter(|slot| !slot.response.is_expired(now))
            .map(|slot| slot.response.clone()))
    }

    async fn put(&self, key: &str, response: CachedResponse) -> Result<()> {
        let size = entry_size(key, &response);
        let mut entries = self.inner.write();
        entries.remove(key);
        if size > self.max_bytes {
            return Ok(());
        }
        while entries.by_key.len() >= self.max_entries || entries.bytes + size > self.max_bytes {
            if !entries.evict_oldest() {
                break;
            }
        }

        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.order.insert(seq, key.to_string());
        entries.bytes += size;
        entries
            .by_key
            .insert(key.to_string(), Slot { seq, size, response });
        Ok(())
    }

    async fn sweep(&self) -> Result<u64> {
        let now = Utc::now();
        let mut entries = self.inner.write();
        let expired: Vec<String> = entries
            .by_key
            .iter()
            .filter(|(_, slot)| slot.response.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(ttl_secs: i64) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::from_static(b"ok"),
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    #[tokio::test]
    async fn object_store_roundtrip_and_delete() {
        let store = MemoryObjectStore::new();
        store
            .put("a", Bytes::from_static(b"1"), ObjectMetadata::with_content_type("text/css"))
            .await
            .unwrap();
        let object = store.get("a").await.unwrap().unwrap();
        assert_eq!(object.metadata.content_type.as_deref(), Some("text/css"));

        assert_eq!(store.delete(&["a".into(), "b".into()]).await.unwrap(), 1);
        assert!(store.is_empty());
    }

    const MIB: usize = 1024 * 1024;

    fn sized(len: usize) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::from(vec![b'x'; len]),
            expires_at: Utc::now() + Duration::seconds(600),
        }
    }

    #[tokio::test]
    async fn response_cache_hides_expired_entries() {
        let cache = MemoryResponseCache::new(8, MIB);
        cache.put("live", entry(60)).await.unwrap();
        cache.put("dead", entry(-1)).await.unwrap();

        assert!(cache.lookup("live").await.unwrap().is_some());
        assert!(cache.lookup("dead").await.unwrap().is_none());
        assert_eq!(cache.sweep().await.unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), entry_size("live", &entry(60)));
    }

    #[tokio::test]
    async fn response_cache_evicts_oldest_when_full() {
        let cache = MemoryResponseCache::new(2, MIB);
        cache.put("first", entry(600)).await.unwrap();
        cache.put("second", entry(10)).await.unwrap();
        cache.put("third", entry(300)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("first").await.unwrap().is_none());
        assert!(cache.lookup("second").await.unwrap().is_some());
        assert!(cache.lookup("third").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn response_cache_evicts_to_stay_within_byte_budget() {
        let cache = MemoryResponseCache::new(100, 1000);
        cache.put("a", sized(400)).await.unwrap();
        cache.put("b", sized(400)).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.put("c", sized(400)).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("a").await.unwrap().is_none());
        assert!(cache.lookup("b").await.unwrap().is_some());
        assert!(cache.lookup("c").await.unwrap().is_some());
        assert!(cache.size_bytes() <= 1000);

        cache.put("huge", sized(2000)).await.unwrap();
        assert!(cache.lookup("huge").await.unwrap().is_none());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn response_cache_replaces_existing_key_without_eviction() {
        let cache = MemoryResponseCache::new(1, MIB);
        cache.put("k", entry(10)).await.unwrap();
        cache.put("k", entry(20)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), entry_size("k", &entry(20)));
    }
}
