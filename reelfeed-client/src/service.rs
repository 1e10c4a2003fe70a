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

use log::{debug, info, warn};

use crate::{
    cache::{Cache, CacheType, Revalidation},
    client::ApiClient,
    config::{FeedConfig, UploadConfig},
    constants::{ACTIVE_ADS_KEY, USER_VIDEOS_PREFIX, VIDEO_PAGE_PREFIX, VIDEO_PREFIX},
    errors::Error,
    feed::integrate_ads,
    models::{Ad, Comment, FeedPage, LikeState, UploadStatus, Video, VideoPage},
    upload::UploadRequest,
};

/// Where a [`FeedService`] gets its data from
#[allow(async_fn_in_trait)]  // this is for local use
pub trait FeedSource {
    /// Sources without conditional request support ignore `etag` and always return
    /// [`Revalidation::Modified`]
    async fn videos(&self, page: u32, limit: u32, etag: Option<&str>) -> Result<Revalidation<VideoPage>, Error>;
    async fn video(&self, id: &str) -> Result<Video, Error>;
    async fn active_ads(&self) -> Result<Vec<Ad>, Error>;
    async fn user_videos(&self, user_id: &str) -> Result<Vec<Video>, Error>;
}

impl FeedSource for ApiClient {
    async fn videos(&self, page: u32, limit: u32, etag: Option<&str>) -> Result<Revalidation<VideoPage>, Error> {
        self.list_videos_conditional(page, limit, etag).await
    }

    async fn video(&self, id: &str) -> Result<Video, Error> {
        self.get_video(id).await
    }

    async fn active_ads(&self) -> Result<Vec<Ad>, Error> {
        ApiClient::active_ads(self).await
    }

    async fn user_videos(&self, user_id: &str) -> Result<Vec<Video>, Error> {
        ApiClient::user_videos(self, user_id).await
    }
}

pub fn video_page_key(page: u32, page_size: u32) -> String {
    format!("{VIDEO_PAGE_PREFIX}{page}:{page_size}")
}

pub fn video_key(id: &str) -> String {
    format!("{VIDEO_PREFIX}{id}")
}

pub fn user_videos_key(user_id: &str) -> String {
    format!("{USER_VIDEOS_PREFIX}{user_id}")
}

/// Cached access to the feed, with ads merged in
pub struct FeedService<S> {
    source: S,
    cache: Cache,
    config: FeedConfig,
    /// signed in user, whose likes are mirrored into cached videos
    user_id: Option<String>,
}

impl<S: FeedSource> FeedService<S> {
    pub fn new(source: S, cache: Cache, config: FeedConfig) -> FeedService<S> {
        FeedService { source, cache, config, user_id: None }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> FeedService<S> {
        self.user_id = user_id;
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub async fn videos(&self, page: u32, force_refresh: bool) -> Result<VideoPage, Error> {
        let limit = self.config.page_size;
        let key = video_page_key(page, limit);
        let max_age = self.cache.max_age(CacheType::Videos);
        self.cache.get_revalidated(&key, CacheType::Videos, max_age, force_refresh, move |etag| async move {
            self.source.videos(page, limit, etag.as_deref()).await
        }).await
    }

    pub async fn video(&self, id: &str, force_refresh: bool) -> Result<Video, Error> {
        self.cache.get_typed(&video_key(id), CacheType::VideoDetail, force_refresh, || self.source.video(id)).await
    }

    pub async fn ads(&self, force_refresh: bool) -> Result<Vec<Ad>, Error> {
        self.cache.get_typed(ACTIVE_ADS_KEY, CacheType::Ads, force_refresh, || self.source.active_ads()).await
    }

    pub async fn user_videos(&self, user_id: &str, force_refresh: bool) -> Result<Vec<Video>, Error> {
        self.cache.get_typed(&user_videos_key(user_id), CacheType::UserVideos, force_refresh, || self.source.user_videos(user_id)).await
    }

    /// One page of the feed with ads placed every `ad_stride` videos
    ///
    /// The page is still returned without ads if they cannot be fetched.
    pub async fn feed(&self, page: u32, force_refresh: bool) -> Result<FeedPage, Error> {
        let videos = self.videos(page, force_refresh).await?;
        let ads = if self.config.ad_stride == 0 {
            Vec::new()
        } else {
            match self.ads(force_refresh).await {
                Ok(ads) => ads,
                Err(e) => {
                    warn!("Failed to fetch ads, showing page {page} without them: {e}");
                    Vec::new()
                },
            }
        };
        Ok(FeedPage {
            items: integrate_ads(videos.videos, &ads, self.config.ad_stride),
            has_more: videos.has_more,
            total: videos.total,
        })
    }

    /// Drops the leading feed pages, all user video lists and the uploaded video itself
    pub async fn after_upload(&self, id: &str) {
        self.invalidate_around(id).await;
    }

    /// Same invalidation as [`FeedService::after_upload`], for a deleted video
    pub async fn after_delete(&self, id: &str) {
        self.invalidate_around(id).await;
    }

    async fn invalidate_around(&self, id: &str) {
        for page in 1..=self.config.invalidate_pages {
            self.invalidate(&video_page_key(page, self.config.page_size)).await;
        }
        if let Err(e) = self.cache.invalidate_prefix(USER_VIDEOS_PREFIX).await {
            warn!("Failed to invalidate cached user videos: {e}");
        }
        self.invalidate(&video_key(id)).await;
    }

    async fn invalidate(&self, key: &str) {
        if let Err(e) = self.cache.invalidate(key).await {
            warn!("Failed to invalidate cache entry {key}: {e}");
        }
    }

    /// Applies `f` to the cached copy of video `id`, if there is one
    async fn update_video(&self, id: &str, f: impl FnOnce(&mut Video)) {
        if self.cache.update(&video_key(id), CacheType::VideoDetail, f).await {
            debug!("Updated cached video {id}");
        }
    }

    fn mirror_like(&self, video: &mut Video, state: LikeState) {
        match &self.user_id {
            Some(user_id) => video.apply_like(state, user_id),
            None => video.likes = state.likes,
        }
    }
}

impl FeedService<ApiClient> {
    /// Uploads the video, waits for the backend to finish processing it and refreshes the feed
    pub async fn upload_and_wait(&self, request: UploadRequest, config: &UploadConfig) -> Result<UploadStatus, Error> {
        let uploaded = self.source.upload_video(request).await?;
        info!("Uploaded video {}, waiting for processing", uploaded.video_id);
        let status = if uploaded.is_finished() {
            uploaded
        } else {
            self.source.wait_for_processing(&uploaded.video_id, config.poll_interval(), config.max_wait()).await?
        };
        self.after_upload(&status.video_id).await;
        Ok(status)
    }

    pub async fn delete_video(&self, id: &str) -> Result<(), Error> {
        self.source.delete_video(id).await?;
        self.after_delete(id).await;
        Ok(())
    }

    // interactions, mirrored into the cached video detail so it doesn't need a refetch

    pub async fn like_video(&self, id: &str) -> Result<LikeState, Error> {
        let state = self.source.like_video(id).await?;
        self.update_video(id, |v| self.mirror_like(v, state)).await;
        Ok(state)
    }

    pub async fn unlike_video(&self, id: &str) -> Result<LikeState, Error> {
        let state = self.source.unlike_video(id).await?;
        self.update_video(id, |v| self.mirror_like(v, state)).await;
        Ok(state)
    }

    pub async fn share_video(&self, id: &str) -> Result<u64, Error> {
        let shares = self.source.share_video(id).await?;
        self.update_video(id, |v| v.apply_share(shares)).await;
        Ok(shares)
    }

    pub async fn post_comment(&self, id: &str, text: &str) -> Result<Comment, Error> {
        let comment = self.source.post_comment(id, text).await?;
        self.update_video(id, |v| v.push_comment(comment.clone())).await;
        Ok(comment)
    }

    pub async fn delete_comment(&self, id: &str, comment_id: &str) -> Result<(), Error> {
        self.source.delete_comment(id, comment_id).await?;
        self.update_video(id, |v| { v.remove_comment(comment_id); }).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::{Cell, RefCell}, collections::HashSet};

    use chrono::Utc;

    use super::*;
    use crate::{config::CacheMaxAges, models::{AdTargeting, FeedItem, Uploader}};

    fn video(id: &str) -> Video {
        Video {
            id: id.to_owned(),
            title: String::new(),
            description: String::new(),
            video_url: String::new(),
            thumbnail_url: String::new(),
            likes: 0,
            views: 0,
            shares: 0,
            liked_by: HashSet::new(),
            uploader: Uploader::default(),
            comments: Vec::new(),
            link: None,
            uploaded_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct FakeSource {
        page_calls: Cell<u32>,
        ad_calls: Cell<u32>,
        ads_fail: Cell<bool>,
        etags: RefCell<Vec<Option<String>>>,
    }

    impl FeedSource for FakeSource {
        async fn videos(&self, page: u32, limit: u32, etag: Option<&str>) -> Result<Revalidation<VideoPage>, Error> {
            self.page_calls.set(self.page_calls.get() + 1);
            self.etags.borrow_mut().push(etag.map(str::to_owned));
            let videos = (0..limit).map(|i| video(&format!("p{page}v{i}"))).collect();
            Ok(Revalidation::Modified { value: VideoPage { videos, has_more: true, total: 100 }, etag: None })
        }

        async fn video(&self, id: &str) -> Result<Video, Error> {
            Ok(video(id))
        }

        async fn active_ads(&self) -> Result<Vec<Ad>, Error> {
            self.ad_calls.set(self.ad_calls.get() + 1);
            if self.ads_fail.get() {
                return Err(Error::ServerError { status: 503, message: None });
            }
            Ok(vec![Ad {
                id: "a1".to_owned(),
                title: String::new(),
                description: String::new(),
                media_url: None,
                link: String::new(),
                budget: 10.,
                targeting: AdTargeting::default(),
                uploader: None,
            }])
        }

        async fn user_videos(&self, user_id: &str) -> Result<Vec<Video>, Error> {
            Ok(vec![video(&format!("{user_id}-1"))])
        }
    }

    fn service(config: FeedConfig) -> FeedService<FakeSource> {
        FeedService::new(FakeSource::default(), Cache::in_memory(CacheMaxAges::default()), config)
    }

    #[tokio::test]
    async fn pages_are_served_from_cache() {
        let service = service(FeedConfig::default());
        let first = service.videos(1, false).await.unwrap();
        let second = service.videos(1, false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.source().page_calls.get(), 1);

        service.videos(2, false).await.unwrap();
        assert_eq!(service.source().page_calls.get(), 2);
    }

    #[tokio::test]
    async fn force_refresh_skips_the_cache() {
        let service = service(FeedConfig::default());
        service.videos(1, false).await.unwrap();
        service.videos(1, true).await.unwrap();
        assert_eq!(service.source().page_calls.get(), 2);
        assert_eq!(*service.source().etags.borrow(), [None::<String>, None]);
    }

    #[tokio::test]
    async fn feed_merges_ads() {
        let service = service(FeedConfig { page_size: 6, ad_stride: 3, invalidate_pages: 1 });
        let page = service.feed(1, false).await.unwrap();
        let ids: Vec<&str> = page.items.iter().map(FeedItem::id).collect();
        assert_eq!(ids, ["p1v0", "p1v1", "p1v2", "a1", "p1v3", "p1v4", "p1v5"]);
        assert!(page.has_more);
        assert_eq!(page.total, 100);

        service.feed(1, false).await.unwrap();
        assert_eq!(service.source().ad_calls.get(), 1);
    }

    #[tokio::test]
    async fn feed_survives_failing_ads() {
        let service = service(FeedConfig { page_size: 6, ad_stride: 3, invalidate_pages: 1 });
        service.source().ads_fail.set(true);
        let page = service.feed(1, false).await.unwrap();
        assert_eq!(page.items.len(), 6);
        assert!(!page.items.iter().any(FeedItem::is_ad));
    }

    #[tokio::test]
    async fn zero_stride_does_not_fetch_ads() {
        let service = service(FeedConfig { page_size: 6, ad_stride: 0, invalidate_pages: 1 });
        assert_eq!(service.feed(1, false).await.unwrap().items.len(), 6);
        assert_eq!(service.source().ad_calls.get(), 0);
    }

    #[tokio::test]
    async fn delete_invalidates_related_entries() {
        let service = service(FeedConfig { page_size: 4, ad_stride: 2, invalidate_pages: 2 });
        for page in 1..=3 {
            service.videos(page, false).await.unwrap();
        }
        service.video("p1v0", false).await.unwrap();
        service.user_videos("u1", false).await.unwrap();
        service.ads(false).await.unwrap();
        assert_eq!(service.cache().stats().await.unwrap().total, 6);

        service.after_delete("p1v0").await;
        // page 3 and the ads remain
        assert_eq!(service.cache().stats().await.unwrap().total, 2);
        service.videos(3, false).await.unwrap();
        assert_eq!(service.source().page_calls.get(), 3);
        service.videos(1, false).await.unwrap();
        assert_eq!(service.source().page_calls.get(), 4);
    }

    #[tokio::test]
    async fn upload_drops_the_uploaded_video() {
        let service = service(FeedConfig { page_size: 4, ad_stride: 2, invalidate_pages: 1 });
        service.videos(1, false).await.unwrap();
        service.video("new", false).await.unwrap();
        service.video("old", false).await.unwrap();

        service.after_upload("new").await;
        assert_eq!(service.cache().stats().await.unwrap().total, 1);
        assert!(service.cache().invalidate(&video_key("old")).await.unwrap());
        assert!(!service.cache().invalidate(&video_key("new")).await.unwrap());
    }
}
