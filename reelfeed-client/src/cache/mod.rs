/* This file is part of the ReelFeed client libraries
*
*  Copyright (C) 2025 mini_bomba
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Get-or-fetch memoization with a per-type time-to-live
//!
//! There is no capacity bound and no background expiry. Entries stay in the store until they are
//! overwritten, invalidated or the store is cleared.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use cloneable_errors::ErrContext;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{config::{CacheBackend, CacheConfig, CacheMaxAges}, errors::Error};

mod fs;
mod store;

pub use fs::FsStore;
pub use store::{CacheStore, MemoryStore};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, strum::Display)]
pub enum CacheType {
    Videos,
    VideoDetail,
    Ads,
    UserVideos,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct CacheEntry {
    pub key: String,
    pub cache_type: CacheType,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub etag: Option<String>,
}

impl CacheEntry {
    /// Entries fetched "in the future" (clock skew) count as fresh
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age <= max_age,
            Err(..) => true,
        }
    }
}

/// Outcome of a conditional fetch
pub enum Revalidation<T> {
    /// the cached payload is still current
    NotModified,
    Modified {
        value: T,
        etag: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    max_ages: CacheMaxAges,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, max_ages: CacheMaxAges) -> Cache {
        Cache { store, clock, max_ages }
    }

    pub fn in_memory(max_ages: CacheMaxAges) -> Cache {
        Cache::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), max_ages)
    }

    pub fn from_config(config: &CacheConfig) -> Cache {
        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::Fs => Arc::new(FsStore::new(config.cache_path.clone())),
        };
        Cache::new(store, Arc::new(SystemClock), config.max_age)
    }

    pub fn max_age(&self, cache_type: CacheType) -> Duration {
        self.max_ages.get(cache_type)
    }

    /// Returns the stored value for `key` if it is younger than `max_age`, otherwise calls `fetch`
    /// and stores its result
    ///
    /// `force_refresh` skips the lookup. A failing `fetch` leaves the stored entry untouched.
    pub async fn get<T, F, Fut>(&self, key: &str, cache_type: CacheType, max_age: Duration, force_refresh: bool, fetch: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if !force_refresh {
            if let Some((entry, value)) = self.lookup::<T>(key, cache_type).await {
                if entry.is_fresh(self.clock.now(), max_age) {
                    debug!("Cache hit for {key}");
                    return Ok(value);
                }
            }
        }
        debug!("Cache miss for {key} (forced: {force_refresh})");
        let value = fetch().await?;
        self.store_value(key, cache_type, &value, None).await;
        Ok(value)
    }

    /// [`Cache::get`] using the configured max age of `cache_type`
    pub async fn get_typed<T, F, Fut>(&self, key: &str, cache_type: CacheType, force_refresh: bool, fetch: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.get(key, cache_type, self.max_age(cache_type), force_refresh, fetch).await
    }

    /// Like [`Cache::get`], but stale entries carrying an `ETag` are revalidated instead of
    /// refetched
    ///
    /// `fetch` receives the stored `ETag`, if any. It receives `None` when `force_refresh` is set.
    pub async fn get_revalidated<T, F, Fut>(&self, key: &str, cache_type: CacheType, max_age: Duration, force_refresh: bool, fetch: F) -> Result<T, Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<String>) -> Fut,
        Fut: Future<Output = Result<Revalidation<T>, Error>>,
    {
        let cached = if force_refresh { None } else { self.lookup::<T>(key, cache_type).await };
        let cached = match cached {
            Some((entry, value)) if entry.is_fresh(self.clock.now(), max_age) => {
                debug!("Cache hit for {key}");
                return Ok(value);
            },
            other => other,
        };

        let etag = cached.as_ref().and_then(|(e, _)| e.etag.clone());
        match fetch(etag).await? {
            Revalidation::Modified { value, etag } => {
                debug!("Cache miss for {key} (forced: {force_refresh})");
                self.store_value(key, cache_type, &value, etag).await;
                Ok(value)
            },
            Revalidation::NotModified => {
                let Some((mut entry, value)) = cached else {
                    return Err(Error::ServerError { status: 304, message: Some("Got 'Not Modified' without sending an ETag".into()) });
                };
                debug!("Cache entry for {key} revalidated");
                entry.fetched_at = self.clock.now();
                if let Err(e) = self.store.put(entry).await {
                    warn!("Failed to refresh cache entry {key}: {e:?}");
                }
                Ok(value)
            },
        }
    }

    /// Rewrites the stored value for `key` in place, keeping its timestamp and `ETag`
    ///
    /// Returns whether an entry was there to update. Nothing is fetched on a miss.
    pub async fn update<T, F>(&self, key: &str, cache_type: CacheType, f: F) -> bool
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let Some((mut entry, mut value)) = self.lookup::<T>(key, cache_type).await else {
            return false;
        };
        f(&mut value);
        entry.payload = match serde_json::to_value(&value) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to encode updated value for cache entry {key}: {e}");
                return false;
            },
        };
        if let Err(e) = self.store.put(entry).await {
            warn!("Failed to update cache entry {key}: {e:?}");
            return false;
        }
        true
    }

    /// Fetches a stored entry and decodes its payload. Unusable entries are dropped.
    async fn lookup<T: DeserializeOwned>(&self, key: &str, cache_type: CacheType) -> Option<(CacheEntry, T)> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache lookup for {key} failed, treating as a miss: {e:?}");
                return None;
            },
        };
        if entry.cache_type != cache_type {
            warn!("Cache entry {key} has type {}, expected {cache_type}; dropping it", entry.cache_type);
            self.discard(key).await;
            return None;
        }
        match serde_json::from_value(entry.payload.clone()) {
            Ok(value) => Some((entry, value)),
            Err(e) => {
                warn!("Cache entry {key} does not decode as {cache_type}, dropping it: {e}");
                self.discard(key).await;
                None
            },
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            warn!("Failed to drop cache entry {key}: {e:?}");
        }
    }

    async fn store_value<T: Serialize>(&self, key: &str, cache_type: CacheType, value: &T, etag: Option<String>) {
        let payload = match serde_json::to_value(value) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to encode value for cache entry {key}: {e}");
                return;
            },
        };
        let entry = CacheEntry {
            key: key.to_owned(),
            cache_type,
            payload,
            fetched_at: self.clock.now(),
            etag,
        };
        if let Err(e) = self.store.put(entry).await {
            warn!("Failed to store cache entry {key}: {e:?}");
        }
    }

    pub async fn invalidate(&self, key: &str) -> Result<bool, Error> {
        self.store.remove(key).await.map_err(|e| Error::Cache(e.context("Failed to invalidate cache entry")))
    }

    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<usize, Error> {
        self.store.remove_prefix(prefix).await.map_err(|e| Error::Cache(e.context("Failed to invalidate cache entries")))
    }

    pub async fn clear(&self) -> Result<usize, Error> {
        self.store.clear().await.map_err(|e| Error::Cache(e.context("Failed to clear the cache")))
    }

    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let entries = self.store.entries().await.map_err(|e| Error::Cache(e.context("Failed to list cache entries")))?;
        let now = self.clock.now();
        Ok(entries.iter().fold(CacheStats::default(), |mut stats, e| {
            stats.total += 1;
            if e.is_fresh(now, self.max_age(e.cache_type)) {
                stats.fresh += 1;
            } else {
                stats.stale += 1;
            }
            stats
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, sync::Mutex};

    use chrono::TimeDelta;
    use cloneable_errors::anyhow;
    use serde_json::json;

    use super::*;

    struct FakeClock(Mutex<DateTime<Utc>>);

    impl FakeClock {
        fn advance(&self, by: TimeDelta) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn setup() -> (Cache, Arc<FakeClock>, Arc<MemoryStore>) {
        let clock = Arc::new(FakeClock(Mutex::new(Utc::now())));
        let store = Arc::new(MemoryStore::new());
        let cache = Cache::new(store.clone(), clock.clone(), CacheMaxAges::default());
        (cache, clock, store)
    }

    const MAX_AGE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn fresh_entries_skip_the_fetch() {
        let (cache, clock, _) = setup();
        let calls = &Cell::new(0);
        let fetch = move || async move {
            calls.set(calls.get() + 1);
            Ok(vec![calls.get()])
        };

        let first: Vec<u32> = cache.get("k", CacheType::Videos, MAX_AGE, false, fetch).await.unwrap();
        clock.advance(TimeDelta::seconds(59));
        let second: Vec<u32> = cache.get("k", CacheType::Videos, MAX_AGE, false, fetch).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn stale_entries_are_refetched() {
        let (cache, clock, _) = setup();
        let calls = &Cell::new(0);
        let fetch = move || async move {
            calls.set(calls.get() + 1);
            Ok(calls.get())
        };

        assert_eq!(cache.get("k", CacheType::Ads, MAX_AGE, false, fetch).await.unwrap(), 1);
        clock.advance(TimeDelta::seconds(61));
        assert_eq!(cache.get("k", CacheType::Ads, MAX_AGE, false, fetch).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn force_refresh_always_fetches() {
        let (cache, _, _) = setup();
        let calls = &Cell::new(0);
        let fetch = move || async move {
            calls.set(calls.get() + 1);
            Ok(calls.get())
        };

        assert_eq!(cache.get("k", CacheType::Ads, MAX_AGE, false, fetch).await.unwrap(), 1);
        assert_eq!(cache.get("k", CacheType::Ads, MAX_AGE, true, fetch).await.unwrap(), 2);
        // the forced result replaced the entry
        assert_eq!(cache.get("k", CacheType::Ads, MAX_AGE, false, fetch).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_the_stale_entry() {
        let (cache, clock, store) = setup();
        let _: u32 = cache.get("k", CacheType::Ads, MAX_AGE, false, || async { Ok(7) }).await.unwrap();
        let before = store.get("k").await.unwrap();
        clock.advance(TimeDelta::minutes(5));

        let result: Result<u32, Error> = cache.get("k", CacheType::Ads, MAX_AGE, false, || async { Err(Error::Timeout) }).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(store.get("k").await.unwrap(), before);

        let forced: Result<u32, Error> = cache.get("k", CacheType::Ads, MAX_AGE, true, || async { Err(Error::NetworkError(anyhow!("unreachable"))) }).await;
        assert!(forced.is_err());
        assert_eq!(store.get("k").await.unwrap(), before);
    }

    #[tokio::test]
    async fn undecodable_entries_are_refetched() {
        let (cache, clock, store) = setup();
        store.put(CacheEntry {
            key: "k".to_owned(),
            cache_type: CacheType::Videos,
            payload: json!({"unexpected": true}),
            fetched_at: clock.now(),
            etag: None,
        }).await.unwrap();

        let value: Vec<String> = cache.get("k", CacheType::Videos, MAX_AGE, false, || async { Ok(vec!["fresh".to_owned()]) }).await.unwrap();
        assert_eq!(value, ["fresh"]);
        assert_eq!(store.get("k").await.unwrap().unwrap().payload, json!(["fresh"]));
    }

    #[tokio::test]
    async fn update_rewrites_the_payload_in_place() {
        let (cache, clock, store) = setup();
        assert!(!cache.update::<Vec<u32>, _>("k", CacheType::Videos, |v| v.push(1)).await);
        assert_eq!(store.get("k").await.unwrap(), None);

        let _: Vec<u32> = cache.get("k", CacheType::Videos, MAX_AGE, false, || async { Ok(vec![1]) }).await.unwrap();
        let fetched_at = store.get("k").await.unwrap().unwrap().fetched_at;
        clock.advance(TimeDelta::seconds(30));

        assert!(cache.update::<Vec<u32>, _>("k", CacheType::Videos, |v| v.push(2)).await);
        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.payload, json!([1, 2]));
        assert_eq!(entry.fetched_at, fetched_at);
    }

    #[tokio::test]
    async fn entries_of_another_type_are_ignored() {
        let (cache, _, _) = setup();
        let _: u32 = cache.get("k", CacheType::Ads, MAX_AGE, false, || async { Ok(1) }).await.unwrap();
        let value: u32 = cache.get("k", CacheType::Videos, MAX_AGE, false, || async { Ok(2) }).await.unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn not_modified_refreshes_the_timestamp() {
        let (cache, clock, store) = setup();
        let seen_etags = Mutex::new(Vec::new());
        let fetch = |value: u32| {
            let seen_etags = &seen_etags;
            move |etag: Option<String>| async move {
                let not_modified = etag.is_some();
                seen_etags.lock().unwrap().push(etag);
                if not_modified {
                    Ok(Revalidation::NotModified)
                } else {
                    Ok(Revalidation::Modified { value, etag: Some("\"v1\"".to_owned()) })
                }
            }
        };

        assert_eq!(cache.get_revalidated("k", CacheType::Videos, MAX_AGE, false, fetch(1)).await.unwrap(), 1);
        clock.advance(TimeDelta::minutes(2));
        assert_eq!(cache.get_revalidated("k", CacheType::Videos, MAX_AGE, false, fetch(2)).await.unwrap(), 1);
        assert_eq!(store.get("k").await.unwrap().unwrap().fetched_at, clock.now());

        // fresh again, no request at all
        assert_eq!(cache.get_revalidated("k", CacheType::Videos, MAX_AGE, false, fetch(3)).await.unwrap(), 1);
        // forced refresh doesn't revalidate
        assert_eq!(cache.get_revalidated("k", CacheType::Videos, MAX_AGE, true, fetch(4)).await.unwrap(), 4);

        assert_eq!(*seen_etags.lock().unwrap(), [None, Some("\"v1\"".to_owned()), None]);
    }

    #[tokio::test]
    async fn invalidation_and_stats() {
        let (cache, clock, _) = setup();
        for key in ["videos:1:10", "videos:2:10", "video:a"] {
            let cache_type = if key.starts_with("videos:") { CacheType::Videos } else { CacheType::VideoDetail };
            let _: u32 = cache.get_typed(key, cache_type, false, || async { Ok(1) }).await.unwrap();
        }
        // past the 5 minute feed TTL, within the 10 minute detail TTL
        clock.advance(TimeDelta::minutes(6));
        assert_eq!(cache.stats().await.unwrap(), CacheStats { total: 3, fresh: 1, stale: 2 });

        assert_eq!(cache.invalidate_prefix("videos:").await.unwrap(), 2);
        assert!(cache.invalidate("video:a").await.unwrap());
        assert_eq!(cache.clear().await.unwrap(), 0);
    }
}
