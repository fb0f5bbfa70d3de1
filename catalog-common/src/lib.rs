// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod normalize;

pub use normalize::{
    ExternalGameEntry, ImportCandidate, Normalized, SkipReason, js_number, js_string, normalize,
};

pub const DEFAULT_IOS_TOP_URL: &str =
    "https://interview-marketing-eng-dev.s3.eu-west-1.amazonaws.com/ios.top100.json";
pub const DEFAULT_ANDROID_TOP_URL: &str =
    "https://interview-marketing-eng-dev.s3.eu-west-1.amazonaws.com/android.top100.json";

pub type GameId = i64;

/// Every column of a game except the primary key and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFields {
    pub publisher_id: String,
    pub name: String,
    pub platform: String,
    pub store_id: String,
    pub bundle_id: String,
    pub app_version: String,
    pub is_published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: GameId,
    #[serde(flatten)]
    pub fields: GameFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write payload handed to a store. `id: None` lets the store assign the key
/// on create and keeps the current key on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDraft {
    pub id: Option<GameId>,
    pub fields: GameFields,
}

impl GameDraft {
    pub fn new(fields: GameFields) -> Self {
        Self { id: None, fields }
    }

    pub fn with_id(id: GameId, fields: GameFields) -> Self {
        Self {
            id: Some(id),
            fields,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    pub publisher_id: Option<String>,
    pub name: Option<String>,
    pub platform: Option<String>,
    pub store_id: Option<String>,
    pub bundle_id: Option<String>,
    pub app_version: Option<String>,
    pub is_published: Option<bool>,
}

impl CreateGameRequest {
    pub fn into_fields(self) -> Result<GameFields, String> {
        fn required(value: Option<String>, field: &str) -> Result<String, String> {
            value.ok_or_else(|| format!("{field} is required"))
        }

        Ok(GameFields {
            publisher_id: required(self.publisher_id, "publisherId")?,
            name: required(self.name, "name")?,
            platform: required(self.platform, "platform")?,
            store_id: required(self.store_id, "storeId")?,
            bundle_id: required(self.bundle_id, "bundleId")?,
            app_version: required(self.app_version, "appVersion")?,
            is_published: self.is_published.unwrap_or(false),
        })
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameRequest {
    pub publisher_id: Option<String>,
    pub name: Option<String>,
    pub platform: Option<String>,
    pub store_id: Option<String>,
    pub bundle_id: Option<String>,
    pub app_version: Option<String>,
    pub is_published: Option<bool>,
}

impl UpdateGameRequest {
    pub fn apply_to(self, current: &GameFields) -> GameFields {
        GameFields {
            publisher_id: self
                .publisher_id
                .unwrap_or_else(|| current.publisher_id.clone()),
            name: self.name.unwrap_or_else(|| current.name.clone()),
            platform: self.platform.unwrap_or_else(|| current.platform.clone()),
            store_id: self.store_id.unwrap_or_else(|| current.store_id.clone()),
            bundle_id: self.bundle_id.unwrap_or_else(|| current.bundle_id.clone()),
            app_version: self
                .app_version
                .unwrap_or_else(|| current.app_version.clone()),
            is_published: self.is_published.unwrap_or(current.is_published),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchGamesRequest {
    pub name: Option<String>,
    pub platform: Option<String>,
}

impl SearchGamesRequest {
    /// Empty strings are treated like missing criteria.
    pub fn into_filter(self) -> GameFilter {
        GameFilter {
            name_contains: self.name.filter(|name| !name.is_empty()),
            platform: self.platform.filter(|platform| !platform.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteGameResponse {
    pub id: GameId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameFilter {
    pub name_contains: Option<String>,
    pub platform: Option<String>,
}

impl GameFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.name_contains.is_none() && self.platform.is_none()
    }

    /// Case-sensitive evaluation used by stores without their own collation.
    pub fn matches(&self, fields: &GameFields) -> bool {
        let name_ok = self
            .name_contains
            .as_deref()
            .is_none_or(|needle| fields.name.contains(needle));
        let platform_ok = self
            .platform
            .as_deref()
            .is_none_or(|platform| fields.platform == platform);
        name_ok && platform_ok
    }
}
