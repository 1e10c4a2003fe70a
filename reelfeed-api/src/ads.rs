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

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, VecSkipError};

use crate::ApiUploader;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiAd {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub targeting: ApiAdTargeting,
    #[serde(default)]
    pub uploader: Option<ApiUploader>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiAdTargeting {
    pub locations: Vec<String>,
    pub interests: Vec<String>,
    pub age_min: Option<u8>,
    pub age_max: Option<u8>,
}

/// Response of the active ads endpoint, a bare array
#[serde_as]
#[derive(Deserialize, Clone, PartialEq, Debug)]
#[serde(transparent)]
pub struct ApiAdList(#[serde_as(as = "VecSkipError<_>")] pub Vec<ApiAd>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_list_skips_broken_entries() {
        let list: ApiAdList = serde_json::from_str(r#"[
            {"_id": "a1", "title": "Shoes", "imageUrl": "/ads/a1.png", "budget": 120.5,
             "targeting": {"locations": ["IN"], "ageMin": 18}},
            {"title": "no id"}
        ]"#).unwrap();
        assert_eq!(list.0.len(), 1);
        let ad = &list.0[0];
        assert_eq!(ad.targeting.locations, ["IN"]);
        assert_eq!(ad.targeting.age_min, Some(18));
        assert_eq!(ad.targeting.age_max, None);
        assert!(ad.uploader.is_none());
    }
}
