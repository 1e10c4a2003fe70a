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

use cloneable_errors::ErrContext;
use reelfeed_api::ApiError;
use reqwest::{StatusCode, Url};
use sha2::{Digest, Sha256};

use crate::{constants::URL_SCHEME_REGEX, errors::Error};

pub trait ReqwestUrlExt {
    #[allow(clippy::result_unit_err)]
    fn extend_segments<I>(&mut self, segments: I) -> Result<&mut Self, ()>
    where I: IntoIterator,
    I::Item: AsRef<str>;
    #[allow(clippy::result_unit_err)]
    fn join_segments<I>(&self, segments: I) -> Result<Self, ()>
    where I: IntoIterator,
    I::Item: AsRef<str>,
    Self: Sized;
}

impl ReqwestUrlExt for Url {
    fn extend_segments<I>(&mut self, segments: I) -> Result<&mut Self, ()>
        where I: IntoIterator,
        I::Item: AsRef<str>,
    {
        {
            let mut path = self.path_segments_mut()?;
            // base URLs usually end with a slash, don't produce `//` when appending to them
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(self)
    }
    fn join_segments<I>(&self, segments: I) -> Result<Self, ()>
        where I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.clone();
        url.extend_segments(segments)?;
        Ok(url)
    }
}

pub trait ReqwestResponseExt: Sized {
    #[allow(async_fn_in_trait)]  // this is for local use
    async fn check_status(self) -> Result<Self, Error>;
}

impl ReqwestResponseExt for reqwest::Response {
    async fn check_status(self) -> Result<Self, Error> {
        let status = self.status();
        if status.is_success() {
            return Ok(self);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(Error::NotAuthenticated),
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            _ => {
                let body = self.text().await.map_err(|e| Error::from_reqwest(e, "Failed to receive the error response body"))?;
                let message = match serde_json::from_str::<ApiError>(&body) {
                    Ok(err) => Some(err.error.into()),
                    Err(..) if body.trim().is_empty() => None,
                    Err(..) => Some(body.trim().into()),
                };
                Err(Error::ServerError { status: status.as_u16(), message })
            }
        }
    }
}

pub async fn decode_json<R>(response: reqwest::Response) -> Result<R, Error>
where R: serde::de::DeserializeOwned,
{
    let body = response.bytes().await.map_err(|e| Error::from_reqwest(e, "Failed to receive the response body"))?;
    serde_json::from_slice(&body).map_err(|e| Error::Decode(e.context("Failed to deserialize response")))
}

/// Turns a media path returned by the backend into an absolute URL
///
/// URLs which already carry a scheme are returned unchanged, anything else is appended to `base`.
pub fn resolve_media_url(base: &Url, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || URL_SCHEME_REGEX.is_match(raw) {
        return raw.to_owned();
    }
    format!("{}/{}", base.as_str().trim_end_matches('/'), raw.trim_start_matches('/'))
}

/// Picks the URL a player should load: the HLS playlist when present, the raw file otherwise
pub fn preferred_media_url(base: &Url, file_url: &str, hls_url: Option<&str>) -> String {
    match hls_url.map(str::trim) {
        Some(hls) if !hls.is_empty() => resolve_media_url(base, hls),
        _ => resolve_media_url(base, file_url),
    }
}

pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn base() -> Url {
        Url::parse("https://api.reelfeed.app/").unwrap()
    }

    #[rstest]
    #[case("/uploads/a.mp4", "https://api.reelfeed.app/uploads/a.mp4")]
    #[case("uploads/a.mp4", "https://api.reelfeed.app/uploads/a.mp4")]
    #[case("https://cdn.example.com/a.mp4", "https://cdn.example.com/a.mp4")]
    #[case("rtmp://live.example.com/a", "rtmp://live.example.com/a")]
    #[case("", "")]
    fn media_url_resolution(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(resolve_media_url(&base(), raw), expected);
    }

    #[test]
    fn media_url_keeps_base_path() {
        let base = Url::parse("http://10.0.2.2:3000/api").unwrap();
        assert_eq!(resolve_media_url(&base, "/uploads/a.mp4"), "http://10.0.2.2:3000/api/uploads/a.mp4");
    }

    #[rstest]
    #[case(Some("/hls/a/master.m3u8"), "https://api.reelfeed.app/hls/a/master.m3u8")]
    #[case(Some(""), "https://api.reelfeed.app/uploads/a.mp4")]
    #[case(Some("   "), "https://api.reelfeed.app/uploads/a.mp4")]
    #[case(None, "https://api.reelfeed.app/uploads/a.mp4")]
    fn hls_supersedes_file_url(#[case] hls: Option<&str>, #[case] expected: &str) {
        assert_eq!(preferred_media_url(&base(), "/uploads/a.mp4", hls), expected);
    }

    #[test]
    fn segments_do_not_double_slashes() {
        let url = base().join_segments(["videos", "a b"]).unwrap();
        assert_eq!(url.as_str(), "https://api.reelfeed.app/videos/a%20b");
        let url = Url::parse("https://x.app/api/").unwrap().join_segments(["ads", "active"]).unwrap();
        assert_eq!(url.as_str(), "https://x.app/api/ads/active");
    }

    #[test]
    fn sha256_is_hex() {
        let hash = sha256_hex("videos:1:10");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
