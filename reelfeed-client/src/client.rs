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

use std::{sync::Arc, time::Duration};

use cloneable_errors::{anyhow, ErrContext};
use log::warn;
use reelfeed_api::{self as api, CommentRequest, FeedbackRequest};
use reqwest::{header::{ACCEPT, ETAG, IF_NONE_MATCH}, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::{
    cache::Revalidation,
    config::ClientConfig,
    constants::USER_AGENT,
    errors::Error,
    models::{Ad, Comment, FollowState, LikeState, Video, VideoPage},
    retry::{self, RetryPolicy},
    utils::{decode_json, ReqwestResponseExt, ReqwestUrlExt},
};

/// Source of the session token sent with authenticated calls
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A token fixed at construction time, `None` for anonymous clients
pub struct StaticToken(pub Option<String>);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Client of the ReelFeed REST backend
///
/// Every call except uploads goes through the retry wrapper. Calls that need a session fail with
/// [`Error::NotAuthenticated`] before anything is sent if the [`TokenProvider`] has no token.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
    upload_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: Url, tokens: Arc<dyn TokenProvider>, retry: RetryPolicy, upload_timeout: Duration) -> Result<ApiClient, Error> {
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(anyhow!("'{}' cannot be used as a base URL", base_url)));
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(retry.timeout)
            .build()
            .map_err(|e| Error::Config(e.context("Failed to build the HTTP client")))?;
        Ok(ApiClient { http, base_url, tokens, retry, upload_timeout })
    }

    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<ApiClient, Error> {
        let base_url = Url::parse(&config.base_url).map_err(|e| Error::Config(e.context(format!("Invalid base URL '{}'", config.base_url))))?;
        ApiClient::new(base_url, tokens, config.retry_policy(), config.upload_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    pub(crate) fn endpoint<I>(&self, segments: I) -> Result<Url, Error>
    where I: IntoIterator,
    I::Item: AsRef<str>,
    {
        self.base_url.join_segments(segments).map_err(|()| Error::Config(anyhow!("Failed to build an endpoint URL from '{}'", self.base_url)))
    }

    pub(crate) fn require_token(&self) -> Result<String, Error> {
        self.tokens.token().ok_or(Error::NotAuthenticated)
    }

    pub(crate) fn build(&self, method: Method, url: &Url, token: Option<&str>) -> RequestBuilder {
        let request = self.http.request(method, url.clone()).header(ACCEPT, "application/json");
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request built by `request` with retries and decodes the JSON body
    pub(crate) async fn fetch<R>(&self, request: impl Fn() -> RequestBuilder) -> Result<R, Error>
    where R: DeserializeOwned,
    {
        let request = &request;
        retry::request(&self.retry, move || async move {
            let response = request().send().await.map_err(|e| Error::from_reqwest(e, "Failed to send the request"))?;
            decode_json(response.check_status().await?).await
        }).await
    }

    /// Like [`ApiClient::fetch`], for endpoints whose response body is not needed
    pub(crate) async fn fetch_empty(&self, request: impl Fn() -> RequestBuilder) -> Result<(), Error> {
        let request = &request;
        retry::request(&self.retry, move || async move {
            request().send().await.map_err(|e| Error::from_reqwest(e, "Failed to send the request"))?.check_status().await?;
            Ok(())
        }).await
    }

    // videos

    pub async fn list_videos(&self, page: u32, limit: u32) -> Result<VideoPage, Error> {
        let url = self.video_list_url(page, limit)?;
        let list: api::ApiVideoList = self.fetch(|| self.build(Method::GET, &url, None)).await?;
        Ok(VideoPage::from_api(list, &self.base_url))
    }

    /// Fetches a page of videos, sending `etag` as `If-None-Match`
    pub async fn list_videos_conditional(&self, page: u32, limit: u32, etag: Option<&str>) -> Result<Revalidation<VideoPage>, Error> {
        let url = &self.video_list_url(page, limit)?;
        retry::request(&self.retry, move || async move {
            let mut request = self.build(Method::GET, url, None);
            if let Some(etag) = etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            let response = request.send().await.map_err(|e| Error::from_reqwest(e, "Failed to send the request"))?;
            if response.status() == StatusCode::NOT_MODIFIED {
                return Ok(Revalidation::NotModified);
            }
            let response = response.check_status().await?;
            let etag = response.headers().get(ETAG).and_then(|v| v.to_str().ok()).map(str::to_owned);
            let list: api::ApiVideoList = decode_json(response).await?;
            Ok(Revalidation::Modified { value: VideoPage::from_api(list, &self.base_url), etag })
        }).await
    }

    fn video_list_url(&self, page: u32, limit: u32) -> Result<Url, Error> {
        let mut url = self.endpoint(["videos"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }

    pub async fn get_video(&self, id: &str) -> Result<Video, Error> {
        let url = self.endpoint(["videos", id])?;
        let video: api::ApiVideo = self.fetch(|| self.build(Method::GET, &url, None)).await?;
        Ok(Video::from_api(video, &self.base_url))
    }

    pub async fn user_videos(&self, user_id: &str) -> Result<Vec<Video>, Error> {
        let url = self.endpoint(["users", user_id, "videos"])?;
        let videos: api::ApiVideoArray = self.fetch(|| self.build(Method::GET, &url, None)).await?;
        Ok(videos.0.into_iter().map(|v| Video::from_api(v, &self.base_url)).collect())
    }

    pub async fn delete_video(&self, id: &str) -> Result<(), Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["videos", id])?;
        self.fetch_empty(|| self.build(Method::DELETE, &url, Some(&token))).await
    }

    // interactions

    pub async fn like_video(&self, id: &str) -> Result<LikeState, Error> {
        self.set_like(id, Method::POST).await
    }

    pub async fn unlike_video(&self, id: &str) -> Result<LikeState, Error> {
        self.set_like(id, Method::DELETE).await
    }

    async fn set_like(&self, id: &str, method: Method) -> Result<LikeState, Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["videos", id, "like"])?;
        let state: api::ApiLikeResponse = self.fetch(|| self.build(method.clone(), &url, Some(&token))).await?;
        Ok(state.into())
    }

    /// Returns the new share count
    pub async fn share_video(&self, id: &str) -> Result<u64, Error> {
        let url = self.endpoint(["videos", id, "share"])?;
        let response: api::ApiShareResponse = self.fetch(|| self.build(Method::POST, &url, None)).await?;
        Ok(response.shares)
    }

    pub async fn post_comment(&self, id: &str, text: &str) -> Result<Comment, Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["videos", id, "comments"])?;
        let body = CommentRequest { text: text.to_owned() };
        let comment: api::ApiComment = self.fetch(|| self.build(Method::POST, &url, Some(&token)).json(&body)).await?;
        Ok(Comment::from_api(comment, &self.base_url))
    }

    pub async fn delete_comment(&self, id: &str, comment_id: &str) -> Result<(), Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["videos", id, "comments", comment_id])?;
        self.fetch_empty(|| self.build(Method::DELETE, &url, Some(&token))).await
    }

    pub async fn follow_user(&self, user_id: &str) -> Result<FollowState, Error> {
        self.set_follow(user_id, Method::POST).await
    }

    pub async fn unfollow_user(&self, user_id: &str) -> Result<FollowState, Error> {
        self.set_follow(user_id, Method::DELETE).await
    }

    async fn set_follow(&self, user_id: &str, method: Method) -> Result<FollowState, Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["users", user_id, "follow"])?;
        let state: api::ApiFollowResponse = self.fetch(|| self.build(method.clone(), &url, Some(&token))).await?;
        Ok(state.into())
    }

    pub async fn submit_feedback(&self, feedback: &FeedbackRequest) -> Result<(), Error> {
        let token = self.require_token()?;
        let url = self.endpoint(["feedback"])?;
        self.fetch_empty(|| self.build(Method::POST, &url, Some(&token)).json(feedback)).await
    }

    // ads

    pub async fn active_ads(&self) -> Result<Vec<Ad>, Error> {
        let url = self.endpoint(["ads", "active"])?;
        let ads: api::ApiAdList = self.fetch(|| self.build(Method::GET, &url, None)).await?;
        Ok(ads.0.into_iter().map(|a| Ad::from_api(a, &self.base_url)).collect())
    }

    pub async fn track_ad_impression(&self, ad_id: &str) {
        self.track_ad(ad_id, "impression").await;
    }

    pub async fn track_ad_click(&self, ad_id: &str) {
        self.track_ad(ad_id, "click").await;
    }

    /// Failures are logged and otherwise ignored
    async fn track_ad(&self, ad_id: &str, event: &str) {
        let result = match self.endpoint(["ads", ad_id, event]) {
            Ok(url) => self.fetch_empty(|| self.build(Method::POST, &url, None)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to track ad {event} for {ad_id}: {e}");
        }
    }
}
