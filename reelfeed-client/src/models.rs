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

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use reelfeed_api::{self as api, ProcessingStatus};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::utils::{preferred_media_url, resolve_media_url};

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct Uploader {
    pub id: String,
    pub name: String,
    pub profile_pic: Option<String>,
}

impl Uploader {
    pub(crate) fn from_api(value: api::ApiUploader, base: &Url) -> Self {
        Self {
            id: value.id,
            name: value.name,
            profile_pic: value.profile_pic.map(|p| resolve_media_url(base, &p)).filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) fn from_api(value: api::ApiComment, base: &Url) -> Self {
        let author = Uploader::from_api(value.user, base);
        Self {
            id: value.id,
            author_id: author.id,
            author_name: author.name,
            author_avatar: author.profile_pic,
            text: value.text,
            created_at: value.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    /// HLS playlist when the backend has one, the raw upload otherwise
    pub video_url: String,
    pub thumbnail_url: String,
    pub likes: u64,
    pub views: u64,
    pub shares: u64,
    pub liked_by: HashSet<String>,
    pub uploader: Uploader,
    pub comments: Vec<Comment>,
    pub link: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl Video {
    pub(crate) fn from_api(value: api::ApiVideo, base: &Url) -> Self {
        Self {
            video_url: preferred_media_url(base, &value.video_url, value.hls_url.as_deref()),
            thumbnail_url: resolve_media_url(base, &value.thumbnail_url),
            id: value.id,
            title: value.title,
            description: value.description,
            likes: value.likes,
            views: value.views,
            shares: value.shares,
            liked_by: value.liked_by.into_iter().collect(),
            uploader: Uploader::from_api(value.uploader, base),
            comments: value.comments.into_iter().map(|c| Comment::from_api(c, base)).collect(),
            link: value.link.filter(|l| !l.trim().is_empty()),
            uploaded_at: value.created_at,
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.liked_by.contains(user_id)
    }

    /// Applies the like state returned by the backend for `user_id`
    pub fn apply_like(&mut self, state: LikeState, user_id: &str) {
        self.likes = state.likes;
        if state.liked {
            self.liked_by.insert(user_id.to_owned());
        } else {
            self.liked_by.remove(user_id);
        }
    }

    pub fn apply_share(&mut self, shares: u64) {
        self.shares = shares;
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Returns whether a comment was removed
    pub fn remove_comment(&mut self, comment_id: &str) -> bool {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != comment_id);
        before != self.comments.len()
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct AdTargeting {
    pub locations: Vec<String>,
    pub interests: Vec<String>,
    pub min_age: Option<u8>,
    pub max_age: Option<u8>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Ad {
    pub id: String,
    pub title: String,
    pub description: String,
    /// video creative if there is one, image creative otherwise
    pub media_url: Option<String>,
    pub link: String,
    pub budget: f64,
    pub targeting: AdTargeting,
    pub uploader: Option<Uploader>,
}

impl Ad {
    pub(crate) fn from_api(value: api::ApiAd, base: &Url) -> Self {
        let media_url = [value.video_url, value.image_url]
            .into_iter()
            .flatten()
            .map(|u| resolve_media_url(base, &u))
            .find(|u| !u.is_empty());
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            media_url,
            link: value.link,
            budget: value.budget,
            targeting: AdTargeting {
                locations: value.targeting.locations,
                interests: value.targeting.interests,
                min_age: value.targeting.age_min,
                max_age: value.targeting.age_max,
            },
            uploader: value.uploader.map(|u| Uploader::from_api(u, base)),
        }
    }
}

/// One row of the rendered feed
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedItem {
    Video(Video),
    Ad(Ad),
}

impl FeedItem {
    pub fn id(&self) -> &str {
        match self {
            FeedItem::Video(v) => &v.id,
            FeedItem::Ad(a) => &a.id,
        }
    }

    pub fn is_ad(&self) -> bool {
        matches!(self, FeedItem::Ad(..))
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub has_more: bool,
    pub total: u64,
}

impl VideoPage {
    pub(crate) fn from_api(value: api::ApiVideoList, base: &Url) -> Self {
        Self {
            videos: value.videos.into_iter().map(|v| Video::from_api(v, base)).collect(),
            has_more: value.has_more,
            total: value.total,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub has_more: bool,
    pub total: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct LikeState {
    pub likes: u64,
    pub liked: bool,
}

impl From<api::ApiLikeResponse> for LikeState {
    fn from(value: api::ApiLikeResponse) -> Self {
        Self { likes: value.likes, liked: value.liked }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct FollowState {
    pub following: bool,
    pub followers: u64,
}

impl From<api::ApiFollowResponse> for FollowState {
    fn from(value: api::ApiFollowResponse) -> Self {
        Self { following: value.following, followers: value.followers }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct UploadStatus {
    pub video_id: String,
    pub status: ProcessingStatus,
    pub hls_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
}

impl UploadStatus {
    pub(crate) fn from_api(value: api::ApiUploadStatus, base: &Url) -> Self {
        Self {
            video_id: value.video_id,
            status: value.status,
            hls_url: value.hls_url.map(|u| resolve_media_url(base, &u)).filter(|u| !u.is_empty()),
            thumbnail_url: value.thumbnail_url.map(|u| resolve_media_url(base, &u)).filter(|u| !u.is_empty()),
            error: value.error,
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.status, ProcessingStatus::Processing)
    }
}
