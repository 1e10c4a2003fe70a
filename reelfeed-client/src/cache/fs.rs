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

use std::{io, path::{Path, PathBuf}, sync::atomic::{AtomicU64, Ordering}};

use cloneable_errors::{ErrorContext, ResContext};
use futures::{future::BoxFuture, FutureExt};
use log::warn;
use tokio::fs;

use crate::{cache::{store::CacheStore, CacheEntry}, utils::sha256_hex};

/// Distinguishes temporary files of concurrent writes to the same entry
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Store keeping one JSON file per entry
///
/// File names are derived from a hash of the key, the key itself is kept inside the file.
/// Files that fail to parse are deleted when encountered.
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> FsStore {
        FsStore { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sha256_hex(key)))
    }

    async fn read_entry(path: &Path) -> Result<Option<CacheEntry>, ErrorContext> {
        let contents = match fs::read(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read cache file '{}'", path.display())),
        };
        match serde_json::from_slice(&contents) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Dropping unreadable cache file '{}': {e}", path.display());
                Self::remove_file(path).await?;
                Ok(None)
            },
        }
    }

    async fn remove_file(path: &Path) -> Result<bool, ErrorContext> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove cache file '{}'", path.display())),
        }
    }

    /// Lists paths of all entry files, a missing directory counts as empty
    async fn list_files(&self) -> Result<Vec<PathBuf>, ErrorContext> {
        let mut files = Vec::new();
        let mut reader = match fs::read_dir(&self.dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e).with_context(|| format!("Failed to list files in directory '{}'", self.dir.display())),
        };
        while let Some(entry) = reader.next_entry().await.with_context(|| format!("Got an error while listing files in directory '{}'", self.dir.display()))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn remove_matching(&self, predicate: impl Fn(&CacheEntry) -> bool) -> Result<usize, ErrorContext> {
        let mut removed = 0;
        for path in self.list_files().await? {
            let Some(entry) = Self::read_entry(&path).await? else { continue };
            if predicate(&entry) && Self::remove_file(&path).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl CacheStore for FsStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>, ErrorContext>> {
        async move {
            let path = self.entry_path(key);
            // a hash collision would surface some other key's payload
            Ok(Self::read_entry(&path).await?.filter(|e| e.key == key))
        }.boxed()
    }

    fn put(&self, entry: CacheEntry) -> BoxFuture<'_, Result<(), ErrorContext>> {
        async move {
            fs::create_dir_all(&self.dir).await.with_context(|| format!("Failed to create cache directory '{}'", self.dir.display()))?;
            let path = self.entry_path(&entry.key);
            let serialized = serde_json::to_vec(&entry).context("Failed to serialize cache entry")?;
            // write to a temporary file first so readers never see a partial entry
            let tmp_path = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), TMP_COUNTER.fetch_add(1, Ordering::Relaxed)));
            fs::write(&tmp_path, serialized).await.with_context(|| format!("Failed to write cache file '{}'", tmp_path.display()))?;
            fs::rename(&tmp_path, &path).await.with_context(|| format!("Failed to move cache file into place at '{}'", path.display()))?;
            Ok(())
        }.boxed()
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<bool, ErrorContext>> {
        async move { Self::remove_file(&self.entry_path(key)).await }.boxed()
    }

    fn remove_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<usize, ErrorContext>> {
        async move { self.remove_matching(|e| e.key.starts_with(prefix)).await }.boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<usize, ErrorContext>> {
        async move {
            let mut removed = 0;
            for path in self.list_files().await? {
                if Self::remove_file(&path).await? {
                    removed += 1;
                }
            }
            Ok(removed)
        }.boxed()
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<CacheEntry>, ErrorContext>> {
        async move {
            let mut entries = Vec::new();
            for path in self.list_files().await? {
                if let Some(entry) = Self::read_entry(&path).await? {
                    entries.push(entry);
                }
            }
            Ok(entries)
        }.boxed()
    }
}
