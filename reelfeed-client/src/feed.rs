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

use crate::models::{Ad, FeedItem, Video};

/// Number of ads [`integrate_ads`] places between `video_count` videos
pub fn ad_slots(video_count: usize, ad_count: usize, stride: usize) -> usize {
    if stride == 0 || video_count == 0 {
        return 0;
    }
    ad_count.min((video_count - 1) / stride)
}

/// Places an ad after every `stride`-th video
///
/// No ad follows the last video, and each ad appears at most once. A `stride` of 0 or an empty
/// ad list returns the videos as they are.
pub fn integrate_ads(videos: Vec<Video>, ads: &[Ad], stride: usize) -> Vec<FeedItem> {
    let slots = ad_slots(videos.len(), ads.len(), stride);
    let mut items = Vec::with_capacity(videos.len() + slots);
    let mut placed = 0;
    for (i, video) in videos.into_iter().enumerate() {
        items.push(FeedItem::Video(video));
        if placed < slots && (i + 1) % stride == 0 {
            items.push(FeedItem::Ad(ads[placed % ads.len()].clone()));
            placed += 1;
        }
    }
    items
}
