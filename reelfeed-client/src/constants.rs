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

use std::{sync::LazyLock, time::Duration};

use cloneable_errors::{anyhow, ErrorContext};
use regex::Regex;

pub const USER_AGENT: &str = concat!("ReelFeed/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

// Cache keys

pub const VIDEO_PAGE_PREFIX: &str  = "videos:";
pub const VIDEO_PREFIX: &str       = "video:";
pub const USER_VIDEOS_PREFIX: &str = "user_videos:";
pub const ACTIVE_ADS_KEY: &str     = "ads:active";

// Regexes

pub static URL_SCHEME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").expect("URL_SCHEME_REGEX should be valid"));

// Lock errors

pub static STORE_LOCK_ERR: LazyLock<ErrorContext> = LazyLock::new(|| anyhow!("Failed to acquire the cache store lock"));
