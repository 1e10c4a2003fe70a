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

use std::{fs::File, io::{self, Read, Write}, path::{Path, PathBuf}, time::Duration};

use cloneable_errors::{ErrorContext, ResContext};
use serde::{Deserialize, Serialize};

use crate::{cache::CacheType, constants::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT}, retry::RetryPolicy};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// backend the client talks to, media paths are resolved against it too
    pub base_url: String,
    pub token: Option<String>,
    /// id of the signed in user, used to mirror likes into cached videos
    pub user_id: Option<String>,
    pub reqwest_timeout_secs: f64,
    pub upload_timeout_secs: f64,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub feed: FeedConfig,
    pub upload: UploadConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: None,
            user_id: None,
            reqwest_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs_f64(),
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT.as_secs_f64(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            feed: FeedConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        secs(self.reqwest_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        secs(self.upload_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            timeout: self.request_timeout(),
        }
    }

    /// Reads the config file at `path`, creating it with default values if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<ClientConfig, ErrorContext> {
        match File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents).with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str(&contents).with_context(|| format!("Failed to deserialize contents of {}", path.display()))
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let cfg = ClientConfig::default();
                let serialized = toml::to_string(&cfg).context("Failed to serialize default ClientConfig as TOML")?;
                let mut file = File::options().write(true).create_new(true).open(path).with_context(|| format!("Failed to create {}", path.display()))?;
                write!(file, "{serialized}").with_context(|| format!("Failed to write serialized default ClientConfig to {}", path.display()))?;
                Ok(cfg)
            },
            Err(e) => Err(e).with_context(|| format!("Failed to open {}", path.display())),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Fs,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// only used by the `fs` backend
    pub cache_path: PathBuf,
    pub max_age: CacheMaxAges,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            cache_path: PathBuf::from("./cache"),
            max_age: CacheMaxAges::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CacheMaxAges {
    pub videos_secs: u64,
    pub video_detail_secs: u64,
    pub ads_secs: u64,
    pub user_videos_secs: u64,
}

impl Default for CacheMaxAges {
    fn default() -> Self {
        Self {
            videos_secs: 5 * 60,
            video_detail_secs: 10 * 60,
            ads_secs: 30 * 60,
            user_videos_secs: 5 * 60,
        }
    }
}

impl CacheMaxAges {
    pub fn get(&self, cache_type: CacheType) -> Duration {
        Duration::from_secs(match cache_type {
            CacheType::Videos => self.videos_secs,
            CacheType::VideoDetail => self.video_detail_secs,
            CacheType::Ads => self.ads_secs,
            CacheType::UserVideos => self.user_videos_secs,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    pub page_size: u32,
    /// an ad is inserted after every `ad_stride` videos, 0 disables ads
    pub ad_stride: usize,
    /// number of leading feed pages dropped from cache after an upload
    pub invalidate_pages: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            ad_stride: 5,
            invalidate_pages: 3,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub poll_interval_secs: f64,
    pub max_wait_secs: f64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5.,
            max_wait_secs: 300.,
        }
    }
}

impl UploadConfig {
    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        secs(self.max_wait_secs)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: ClientConfig = toml::from_str(r#"
            base_url = "https://api.reelfeed.app/"

            [feed]
            ad_stride = 3

            [cache.max_age]
            ads_secs = 60
        "#).unwrap();
        assert_eq!(cfg.base_url, "https://api.reelfeed.app/");
        assert_eq!(cfg.feed.ad_stride, 3);
        assert_eq!(cfg.feed.page_size, 10);
        assert_eq!(cfg.cache.max_age.get(CacheType::Ads), Duration::from_secs(60));
        assert_eq!(cfg.cache.max_age.get(CacheType::Videos), Duration::from_secs(300));
        assert_eq!(cfg.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = ClientConfig::load_or_create(&path).unwrap();
        assert_eq!(created, ClientConfig::default());
        assert!(path.exists());

        let loaded = ClientConfig::load_or_create(&path).unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn retry_policy_uses_request_timeout() {
        let cfg = ClientConfig { reqwest_timeout_secs: 2.5, ..Default::default() };
        let policy = cfg.retry_policy();
        assert_eq!(policy.timeout, Duration::from_millis(2500));
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        let cfg = UploadConfig { poll_interval_secs: -1., max_wait_secs: f64::NAN };
        assert_eq!(cfg.poll_interval(), Duration::ZERO);
        assert_eq!(cfg.max_wait(), Duration::ZERO);
    }
}
