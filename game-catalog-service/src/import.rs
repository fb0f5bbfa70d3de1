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

//! Top-list import: fetch both lists, normalize every entry, then upsert the
//! candidates one by one. Stages run strictly in that order so a failed fetch
//! never leaves a half-imported store behind.

use std::str::FromStr;

use async_trait::async_trait;
use catalog_common::{
    DEFAULT_ANDROID_TOP_URL, DEFAULT_IOS_TOP_URL, ExternalGameEntry, GameFilter, GameId,
    GameRecord, ImportCandidate, Normalized, normalize,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::store::GameStore;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("failed to parse {url}: {message}")]
    Parse { url: String, message: String },
    #[error("Impossible to create game: {id}")]
    CreateFailed { id: GameId },
    #[error("Impossible to update game: {id}")]
    UpdateFailed { id: GameId },
    #[error("game store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, ImportError>;
}

/// Single-attempt HTTP GET; no retries and no timeout beyond the client default.
#[derive(Clone, Default)]
pub struct HttpSourceFetcher {
    client: reqwest::Client,
}

impl HttpSourceFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, ImportError> {
        let fetch_error = |message: String| ImportError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| fetch_error(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!(
                "Failed to fetch the file. Status: {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|error| fetch_error(error.to_string()))?;
        serde_json::from_slice(&body).map_err(|error| ImportError::Parse {
            url: url.to_string(),
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, ImportError> {
        let result = self.get_json(url).await;
        if let Err(error) = &result {
            error!(url = %url, error = %error, "failed to fetch or parse top list");
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSources {
    pub ios_url: String,
    pub android_url: String,
}

impl Default for ImportSources {
    fn default() -> Self {
        Self {
            ios_url: DEFAULT_IOS_TOP_URL.to_string(),
            android_url: DEFAULT_ANDROID_TOP_URL.to_string(),
        }
    }
}

impl ImportSources {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ios_url: env_url("IOS_TOP_URL").unwrap_or(defaults.ios_url),
            android_url: env_url("ANDROID_TOP_URL").unwrap_or(defaults.android_url),
        }
    }

    fn in_fetch_order(&self) -> [&str; 2] {
        [self.ios_url.as_str(), self.android_url.as_str()]
    }
}

fn env_url(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Which id the reconciler uses to decide between create and update.
///
/// `OriginalId` looks up by the entry's own `id` even when the record is
/// written under its `appId`. Entries keyed by `appId` are then never found
/// again and a second import fails on the duplicate key. `CanonicalId` looks
/// up by the key the record is actually written under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupKeyPolicy {
    #[default]
    OriginalId,
    CanonicalId,
}

impl LookupKeyPolicy {
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("IMPORT_LOOKUP_KEY") {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(Self::default()),
        }
    }

    fn key_for(self, candidate: &ImportCandidate) -> Option<GameId> {
        match self {
            Self::OriginalId => candidate.lookup_key,
            Self::CanonicalId => Some(candidate.id),
        }
    }
}

impl FromStr for LookupKeyPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(Self::OriginalId),
            "canonical" => Ok(Self::CanonicalId),
            other => anyhow::bail!(
                "invalid IMPORT_LOOKUP_KEY {other:?}: expected \"original\" or \"canonical\""
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub fetched: usize,
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub report: ImportReport,
    pub games: Vec<GameRecord>,
}

/// Fetches both lists in order and flattens each one level.
pub async fn fetch_entries(
    fetcher: &dyn SourceFetcher,
    sources: &ImportSources,
) -> Result<Vec<ExternalGameEntry>, ImportError> {
    let mut entries = Vec::new();
    for url in sources.in_fetch_order() {
        let document = fetcher.fetch_json(url).await?;
        let list = flatten_top_list(url, document)?;
        info!(url = %url, entries = list.len(), "fetched top list");
        entries.extend(list);
    }
    Ok(entries)
}

pub fn flatten_top_list(url: &str, document: Value) -> Result<Vec<ExternalGameEntry>, ImportError> {
    let Value::Array(items) = document else {
        return Err(ImportError::Parse {
            url: url.to_string(),
            message: "expected a JSON array".to_string(),
        });
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in &items {
        match item {
            Value::Array(nested) => entries.extend(nested.iter().map(ExternalGameEntry::from_value)),
            other => entries.push(ExternalGameEntry::from_value(other)),
        }
    }
    Ok(entries)
}

/// Returns the candidates in input order together with the number of skipped entries.
pub fn normalize_entries(entries: &[ExternalGameEntry]) -> (Vec<ImportCandidate>, usize) {
    let mut candidates = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (position, entry) in entries.iter().enumerate() {
        match normalize(entry) {
            Normalized::Candidate(candidate) => candidates.push(candidate),
            Normalized::Skip(reason) => {
                skipped += 1;
                debug!(position, reason = ?reason, "skipping top list entry");
            }
        }
    }
    (candidates, skipped)
}

/// One store read (when there is a key to look up) followed by one write.
pub async fn reconcile(
    store: &dyn GameStore,
    candidate: &ImportCandidate,
    policy: LookupKeyPolicy,
) -> Result<ReconcileOutcome, ImportError> {
    let existing = match policy.key_for(candidate) {
        Some(key) => store.find_by_key(key).await?,
        None => None,
    };
    let draft = candidate.draft();

    match existing {
        None => {
            if store.create(&draft).await?.is_none() {
                return Err(ImportError::CreateFailed { id: candidate.id });
            }
            debug!(game_id = candidate.id, "created game from top list");
            Ok(ReconcileOutcome::Created)
        }
        Some(existing) => {
            if store.update(existing.id, &draft).await? == 0 {
                return Err(ImportError::UpdateFailed { id: existing.id });
            }
            debug!(
                game_id = candidate.id,
                stored_id = existing.id,
                "updated game from top list"
            );
            Ok(ReconcileOutcome::Updated)
        }
    }
}

/// Stops at the first failing candidate; earlier writes are kept.
pub async fn reconcile_all(
    store: &dyn GameStore,
    candidates: &[ImportCandidate],
    policy: LookupKeyPolicy,
    report: &mut ImportReport,
) -> Result<(), ImportError> {
    for candidate in candidates {
        match reconcile(store, candidate, policy).await? {
            ReconcileOutcome::Created => report.created += 1,
            ReconcileOutcome::Updated => report.updated += 1,
        }
    }
    Ok(())
}

pub async fn run_import(
    store: &dyn GameStore,
    fetcher: &dyn SourceFetcher,
    sources: &ImportSources,
    policy: LookupKeyPolicy,
) -> Result<ImportSummary, ImportError> {
    let entries = fetch_entries(fetcher, sources).await?;
    let (candidates, skipped) = normalize_entries(&entries);

    let mut report = ImportReport {
        fetched: entries.len(),
        skipped,
        ..ImportReport::default()
    };
    reconcile_all(store, &candidates, policy, &mut report).await?;

    info!(
        fetched = report.fetched,
        skipped = report.skipped,
        created = report.created,
        updated = report.updated,
        "top list import finished"
    );

    let games = store.find_all(&GameFilter::all()).await?;
    Ok(ImportSummary { report, games })
}
