use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

pub const DEFAULT_CACHE_MAX_SIZE: usize = 128;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// 快取命中統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub total: u64,
}

impl CacheStatistics {
    pub fn hit_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.hits as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    output: Value,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    stats: CacheStatistics,
}

/// 每台裝置一份的指令輸出快取
///
/// 同一個 key 以獨立的 async lock 序列化，讓共用相同指令的測試只觸發一次收集；
/// 其餘測試在鎖釋放後直接命中快取。
#[derive(Debug)]
pub struct CommandCache {
    store: Mutex<CacheStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    max_size: usize,
    ttl: Duration,
}

impl Default for CommandCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL)
    }
}

impl CommandCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            store: Mutex::new(CacheStore::default()),
            locks: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// 查詢、收集到寫入 `key` 的整段期間都要持有此 guard
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // 只有 map 持有的鎖代表沒有人在用，可以丟掉
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut store = self.store.lock().await;
        store.stats.total += 1;

        let expired = match store.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            store.entries.remove(key);
            store.order.retain(|k| k != key);
            return None;
        }

        store.stats.hits += 1;
        store.entries.get(key).map(|entry| entry.output.clone())
    }

    pub async fn insert(&self, key: String, output: Value) {
        let mut store = self.store.lock().await;
        if store.entries.contains_key(&key) {
            store.order.retain(|k| k != &key);
        }
        while store.entries.len() >= self.max_size && !store.entries.contains_key(&key) {
            match store.order.pop_front() {
                Some(oldest) => {
                    store.entries.remove(&oldest);
                }
                None => break,
            }
        }
        store.order.push_back(key.clone());
        store.entries.insert(
            key,
            CacheEntry {
                output,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn clear(&self) {
        let mut store = self.store.lock().await;
        store.entries.clear();
        store.order.clear();
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.entries.len()
    }

    pub async fn statistics(&self) -> CacheStatistics {
        self.store.lock().await.stats
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_cache_hit_and_statistics() {
        let cache = CommandCache::default();
        assert!(cache.get("show version_latest__json").await.is_none());

        cache
            .insert("show version_latest__json".to_string(), json!({"version": "4.31.1F"}))
            .await;
        let hit = cache.get("show version_latest__json").await;
        assert_eq!(hit, Some(json!({"version": "4.31.1F"})));

        let stats = cache.statistics().await;
        assert_eq!(stats, CacheStatistics { hits: 1, total: 2 });
        assert!((stats.hit_ratio() - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest_entry() {
        let cache = CommandCache::new(2, DEFAULT_CACHE_TTL);
        cache.insert("a".to_string(), json!(1)).await;
        cache.insert("b".to_string(), json!(2)).await;
        cache.insert("c".to_string(), json!(3)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.get("c").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_cache_entry_expires() {
        let cache = CommandCache::new(8, Duration::from_millis(10));
        cache.insert("a".to_string(), json!(1)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_key_lock_serializes_same_key() {
        let cache = Arc::new(CommandCache::default());
        let guard = cache.lock_key("show version").await;

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let _guard = cache.lock_key("show version").await;
                cache.get("show version").await
            })
        };

        cache.insert("show version".to_string(), json!({"ok": true})).await;
        drop(guard);

        let seen = waiter.await.unwrap();
        assert_eq!(seen, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_idle_key_locks_are_released() {
        let cache = CommandCache::new(2, DEFAULT_CACHE_TTL);
        for i in 0..1000 {
            let key = format!("ping 10.0.{}.{}", i / 256, i % 256);
            let _guard = cache.lock_key(&key).await;
            cache.insert(key, json!({"ok": true})).await;
        }
        assert_eq!(cache.len().await, 2);
        // 最後一把鎖在下一次 lock_key 時才會清掉
        assert!(cache.lock_count().await <= 1);

        let held = cache.lock_key("show version").await;
        let _other = cache.lock_key("show clock").await;
        assert_eq!(cache.lock_count().await, 2);
        drop(held);
        let _third = cache.lock_key("show interfaces").await;
        // "show version" 已釋放，只剩仍被持有的兩把
        assert_eq!(cache.lock_count().await, 2);
    }
}
