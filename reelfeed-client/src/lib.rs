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

//! Data layer of the ReelFeed short video app
//!
//! [`ApiClient`] talks to the REST backend, [`Cache`] memoizes its responses and
//! [`FeedService`] combines both into feed pages with ads placed between videos.

pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod feed;
pub mod models;
pub mod retry;
pub mod service;
pub mod upload;
mod utils;

pub use reelfeed_api as api;

pub use cache::{Cache, CacheStats, CacheType};
pub use client::{ApiClient, StaticToken, TokenProvider};
pub use config::ClientConfig;
pub use errors::{Error, Result};
pub use feed::integrate_ads;
pub use models::{Ad, Comment, FeedItem, FeedPage, FollowState, LikeState, UploadStatus, Video, VideoPage};
pub use retry::RetryPolicy;
pub use service::{FeedService, FeedSource};
pub use upload::UploadRequest;
pub use utils::resolve_media_url;
