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

//! Wire models of the ReelFeed REST backend
//!
//! These types mirror the JSON the backend sends and accepts. They are only validated for shape
//! here, turning them into domain records is done by `reelfeed-client`.

mod ads;
mod requests;
mod videos;

pub use ads::*;
pub use requests::*;
pub use videos::*;

use serde::{Deserialize, Serialize};

/// Body of every non-2xx response the backend produces on purpose
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ApiError {
    pub error: String,
}

/// Public profile fragment embedded in videos, comments and ads
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiUploader {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
}
