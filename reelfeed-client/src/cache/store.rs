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

use std::{collections::HashMap, sync::Mutex};

use cloneable_errors::ErrorContext;
use futures::{future::{ready, BoxFuture}, FutureExt};

use crate::{cache::CacheEntry, constants::STORE_LOCK_ERR};

/// Backing storage of a [`super::Cache`]
///
/// Stores hold whole entries only. A store never hands out an entry it cannot fully read back.
pub trait CacheStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>, ErrorContext>>;

    /// Inserts the entry, replacing any previous entry with the same key
    fn put(&self, entry: CacheEntry) -> BoxFuture<'_, Result<(), ErrorContext>>;

    /// Returns whether an entry was removed
    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, ErrorContext>>;

    /// Returns the number of removed entries
    fn remove_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<usize, ErrorContext>>;

    /// Returns the number of removed entries
    fn clear(&self) -> BoxFuture<'_, Result<usize, ErrorContext>>;

    fn entries(&self) -> BoxFuture<'_, Result<Vec<CacheEntry>, ErrorContext>>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, CacheEntry>) -> R) -> Result<R, ErrorContext> {
        let mut entries = self.entries.lock().map_err(|_| STORE_LOCK_ERR.clone())?;
        Ok(f(&mut entries))
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>, ErrorContext>> {
        ready(self.with_entries(|e| e.get(key).cloned())).boxed()
    }

    fn put(&self, entry: CacheEntry) -> BoxFuture<'_, Result<(), ErrorContext>> {
        ready(self.with_entries(|e| {
            e.insert(entry.key.clone(), entry);
        })).boxed()
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, ErrorContext>> {
        ready(self.with_entries(|e| e.remove(key).is_some())).boxed()
    }

    fn remove_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<usize, ErrorContext>> {
        ready(self.with_entries(|e| {
            let before = e.len();
            e.retain(|k, _| !k.starts_with(prefix));
            before - e.len()
        })).boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<usize, ErrorContext>> {
        ready(self.with_entries(|e| {
            let count = e.len();
            e.clear();
            count
        })).boxed()
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<CacheEntry>, ErrorContext>> {
        ready(self.with_entries(|e| e.values().cloned().collect())).boxed()
    }
}
