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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, VecSkipError};

use crate::ApiUploader;

#[serde_as]
#[derive(Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiVideo {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_url: String,
    /// Adaptive streaming playlist, set once the backend finished transcoding
    #[serde(default)]
    pub hls_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub liked_by: Vec<String>,
    pub uploader: ApiUploader,
    #[serde_as(as = "VecSkipError<_>")]
    #[serde(default)]
    pub comments: Vec<ApiComment>,
    #[serde(default)]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiComment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: ApiUploader,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Response of the paginated video listing
#[serde_as]
#[derive(Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiVideoList {
    #[serde_as(as = "VecSkipError<_>")]
    pub videos: Vec<ApiVideo>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total: u64,
}

/// Response of the user videos endpoint, a bare array
#[serde_as]
#[derive(Deserialize, Clone, PartialEq, Debug)]
#[serde(transparent)]
pub struct ApiVideoArray(#[serde_as(as = "VecSkipError<_>")] pub Vec<ApiVideo>);

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct ApiLikeResponse {
    pub likes: u64,
    pub liked: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct ApiShareResponse {
    pub shares: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Processing,
    #[serde(alias = "ready")]
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiUploadStatus {
    pub video_id: String,
    pub status: ProcessingStatus,
    #[serde(default)]
    pub hls_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO: &str = r#"{
        "_id": "v1",
        "title": "Sunset",
        "videoUrl": "/uploads/v1.mp4",
        "hlsUrl": "/hls/v1/master.m3u8",
        "likes": 3,
        "likedBy": ["u2", "u3"],
        "uploader": {"_id": "u1", "name": "Ana"},
        "comments": [
            {"_id": "c1", "user": {"_id": "u2"}, "text": "nice", "createdAt": "2025-03-01T10:00:00Z"},
            {"_id": "c2", "text": "missing author"}
        ],
        "createdAt": "2025-03-01T09:00:00Z"
    }"#;

    #[test]
    fn video_skips_malformed_comments() {
        let video: ApiVideo = serde_json::from_str(VIDEO).unwrap();
        assert_eq!(video.comments.len(), 1);
        assert_eq!(video.comments[0].id, "c1");
        assert_eq!(video.views, 0);
        assert_eq!(video.hls_url.as_deref(), Some("/hls/v1/master.m3u8"));
    }

    #[test]
    fn list_skips_malformed_videos() {
        let body = format!(r#"{{"videos": [{VIDEO}, {{"_id": "broken"}}], "hasMore": true, "total": 41}}"#);
        let list: ApiVideoList = serde_json::from_str(&body).unwrap();
        assert_eq!(list.videos.len(), 1);
        assert!(list.has_more);
        assert_eq!(list.total, 41);
    }

    #[test]
    fn processing_status_accepts_ready_alias() {
        let status: ApiUploadStatus = serde_json::from_str(r#"{"videoId": "v1", "status": "ready"}"#).unwrap();
        assert_eq!(status.status, ProcessingStatus::Completed);
    }
}
