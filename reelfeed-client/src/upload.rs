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

use std::{path::Path, time::Duration};

use cloneable_errors::{ErrContext, ResContext};
use log::{debug, info};
use reelfeed_api::{ApiUploadStatus, ProcessingStatus};
use reqwest::{multipart::{Form, Part}, Method};
use tokio::time::{sleep, Instant};

use crate::{
    client::ApiClient,
    errors::Error,
    models::UploadStatus,
    utils::{decode_json, ReqwestResponseExt},
};

/// A video file together with the metadata sent along with it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub link: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    /// Reads the video file at `path`, leaving all metadata empty
    pub async fn from_path(path: &Path) -> Result<UploadRequest, Error> {
        let bytes = tokio::fs::read(path).await
            .with_context(|| format!("Failed to read video file '{}'", path.display()))
            .map_err(Error::Config)?;
        let file_name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_owned());
        Ok(UploadRequest {
            title: String::new(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            link: None,
            file_name,
            bytes,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        let extension = Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("mov") => "video/quicktime",
            Some("webm") => "video/webm",
            Some("mkv") => "video/x-matroska",
            Some("avi") => "video/x-msvideo",
            Some("3gp") => "video/3gpp",
            _ => "video/mp4",
        }
    }

    fn into_form(self) -> Result<Form, Error> {
        let mime = self.mime_type();
        let video = video_part(self.bytes, self.file_name, mime)?;
        Ok(Form::new()
            .text("title", self.title)
            .text("description", self.description)
            .text("category", self.category)
            .text("tags", self.tags.join(","))
            .text("link", self.link.unwrap_or_default())
            .part("video", video))
    }
}

fn video_part(bytes: Vec<u8>, file_name: String, mime: &str) -> Result<Part, Error> {
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime)
        .map_err(|e| Error::Config(e.context(format!("'{mime}' is not a valid content type"))))
}

impl ApiClient {
    /// Sends the video as a multipart form
    ///
    /// The body cannot be replayed, so this is a single attempt bounded by the upload timeout.
    pub async fn upload_video(&self, request: UploadRequest) -> Result<UploadStatus, Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["videos", "upload"])?;
        let size = request.bytes.len();
        let form = request.into_form()?;
        info!("Uploading {size} bytes to {url}");
        let response = self.build(Method::POST, &url, Some(&token))
            .multipart(form)
            .timeout(self.upload_timeout())
            .send().await
            .map_err(|e| Error::from_reqwest(e, "Failed to send the upload request"))?
            .check_status().await?;
        let status: ApiUploadStatus = decode_json(response).await?;
        Ok(UploadStatus::from_api(status, self.base_url()))
    }

    pub async fn upload_status(&self, video_id: &str) -> Result<UploadStatus, Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["videos", video_id, "status"])?;
        let status: ApiUploadStatus = self.fetch(|| self.build(Method::GET, &url, Some(&token))).await?;
        Ok(UploadStatus::from_api(status, self.base_url()))
    }

    /// Polls the processing status every `interval` until it leaves `processing`
    ///
    /// Returns [`Error::Timeout`] once `max_wait` has passed without a final status.
    pub async fn wait_for_processing(&self, video_id: &str, interval: Duration, max_wait: Duration) -> Result<UploadStatus, Error> {
        let deadline = Instant::now() + max_wait;
        loop {
            let status = self.upload_status(video_id).await?;
            match status.status {
                ProcessingStatus::Completed | ProcessingStatus::Failed => return Ok(status),
                ProcessingStatus::Processing => debug!("Video {video_id} is still processing"),
            }
            let now = Instant::now();
            if now + interval > deadline {
                return Err(Error::Timeout);
            }
            sleep(interval).await;
        }
    }
}
