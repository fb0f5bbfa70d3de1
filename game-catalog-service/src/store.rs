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

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use catalog_common::{GameDraft, GameFields, GameFilter, GameId, GameRecord};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, sqlite::SqlitePoolOptions};
use tokio::sync::RwLock;
use tracing::info;

/// Persistence for catalog games. Writes report how many rows they touched
/// so callers can tell a missing row from a failed write.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Matching records ordered by id.
    async fn find_all(&self, filter: &GameFilter) -> anyhow::Result<Vec<GameRecord>>;
    async fn find_by_key(&self, id: GameId) -> anyhow::Result<Option<GameRecord>>;
    /// Fails when `draft.id` is already taken.
    async fn create(&self, draft: &GameDraft) -> anyhow::Result<Option<GameRecord>>;
    /// Replaces every field of record `id`; a draft id moves the record to that key.
    async fn update(&self, id: GameId, draft: &GameDraft) -> anyhow::Result<u64>;
    async fn delete(&self, id: GameId) -> anyhow::Result<u64>;
}

#[derive(Default)]
pub struct InMemoryGameStore {
    games: RwLock<BTreeMap<GameId, GameRecord>>,
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn find_all(&self, filter: &GameFilter) -> anyhow::Result<Vec<GameRecord>> {
        let games = self.games.read().await;
        Ok(games
            .values()
            .filter(|game| filter.matches(&game.fields))
            .cloned()
            .collect())
    }

    async fn find_by_key(&self, id: GameId) -> anyhow::Result<Option<GameRecord>> {
        Ok(self.games.read().await.get(&id).cloned())
    }

    async fn create(&self, draft: &GameDraft) -> anyhow::Result<Option<GameRecord>> {
        let mut games = self.games.write().await;
        let id = match draft.id {
            Some(id) if games.contains_key(&id) => {
                anyhow::bail!("game {id} already exists");
            }
            Some(id) => id,
            None => match games.last_key_value() {
                Some((last, _)) => last
                    .checked_add(1)
                    .context("game id space exhausted")?,
                None => 1,
            },
        };

        let now = Utc::now();
        let game = GameRecord {
            id,
            fields: draft.fields.clone(),
            created_at: now,
            updated_at: now,
        };
        games.insert(id, game.clone());
        Ok(Some(game))
    }

    async fn update(&self, id: GameId, draft: &GameDraft) -> anyhow::Result<u64> {
        let mut games = self.games.write().await;
        let Some(created_at) = games.get(&id).map(|game| game.created_at) else {
            return Ok(0);
        };

        let new_id = draft.id.unwrap_or(id);
        if new_id != id && games.contains_key(&new_id) {
            anyhow::bail!("cannot move game {id} to {new_id}: key already exists");
        }

        games.remove(&id);
        games.insert(
            new_id,
            GameRecord {
                id: new_id,
                fields: draft.fields.clone(),
                created_at,
                updated_at: Utc::now(),
            },
        );
        Ok(1)
    }

    async fn delete(&self, id: GameId) -> anyhow::Result<u64> {
        Ok(u64::from(self.games.write().await.remove(&id).is_some()))
    }
}

const CREATE_GAMES_TABLE: &str = "CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY,
    publisher_id TEXT NOT NULL,
    name TEXT NOT NULL,
    platform TEXT NOT NULL,
    store_id TEXT NOT NULL,
    bundle_id TEXT NOT NULL,
    app_version TEXT NOT NULL,
    is_published BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const GAME_COLUMNS: &str = "id, publisher_id, name, platform, store_id, bundle_id, \
                            app_version, is_published, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct GameRow {
    id: i64,
    publisher_id: String,
    name: String,
    platform: String,
    store_id: String,
    bundle_id: String,
    app_version: String,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GameRow> for GameRecord {
    fn from(row: GameRow) -> Self {
        GameRecord {
            id: row.id,
            fields: GameFields {
                publisher_id: row.publisher_id,
                name: row.name,
                platform: row.platform,
                store_id: row.store_id,
                bundle_id: row.bundle_id,
                app_version: row.app_version,
                is_published: row.is_published,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Relational store. Name search uses SQLite `LIKE`, which ignores ASCII case.
#[derive(Clone)]
pub struct SqliteGameStore {
    pool: SqlitePool,
}

impl SqliteGameStore {
    // The URL may carry credentials or private paths; keep it out of logs.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to sqlite game store")?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!(max_connections, "connected to sqlite game store");
        Ok(store)
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(CREATE_GAMES_TABLE)
            .execute(&self.pool)
            .await
            .context("failed to create games table")?;
        Ok(())
    }
}

#[async_trait]
impl GameStore for SqliteGameStore {
    async fn find_all(&self, filter: &GameFilter) -> anyhow::Result<Vec<GameRecord>> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {GAME_COLUMNS} FROM games WHERE 1 = 1"));
        if let Some(name) = &filter.name_contains {
            query.push(" AND name LIKE ").push_bind(format!("%{name}%"));
        }
        if let Some(platform) = &filter.platform {
            query.push(" AND platform = ").push_bind(platform.clone());
        }
        query.push(" ORDER BY id");

        let rows = query
            .build_query_as::<GameRow>()
            .fetch_all(&self.pool)
            .await
            .context("failed to query games")?;
        Ok(rows.into_iter().map(GameRecord::from).collect())
    }

    async fn find_by_key(&self, id: GameId) -> anyhow::Result<Option<GameRecord>> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE id = ?");
        let row = sqlx::query_as::<_, GameRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load game {id}"))?;
        Ok(row.map(GameRecord::from))
    }

    async fn create(&self, draft: &GameDraft) -> anyhow::Result<Option<GameRecord>> {
        let sql = format!(
            "INSERT INTO games ({GAME_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {GAME_COLUMNS}"
        );
        let now = Utc::now();
        let fields = &draft.fields;
        let row = sqlx::query_as::<_, GameRow>(&sql)
            .bind(draft.id)
            .bind(fields.publisher_id.as_str())
            .bind(fields.name.as_str())
            .bind(fields.platform.as_str())
            .bind(fields.store_id.as_str())
            .bind(fields.bundle_id.as_str())
            .bind(fields.app_version.as_str())
            .bind(fields.is_published)
            .bind(now)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| match draft.id {
                Some(id) => format!("failed to insert game {id}"),
                None => "failed to insert game".to_string(),
            })?;
        Ok(row.map(GameRecord::from))
    }

    async fn update(&self, id: GameId, draft: &GameDraft) -> anyhow::Result<u64> {
        let fields = &draft.fields;
        let result = sqlx::query(
            "UPDATE games SET id = COALESCE(?, id), publisher_id = ?, name = ?, platform = ?, \
             store_id = ?, bundle_id = ?, app_version = ?, is_published = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(draft.id)
        .bind(fields.publisher_id.as_str())
        .bind(fields.name.as_str())
        .bind(fields.platform.as_str())
        .bind(fields.store_id.as_str())
        .bind(fields.bundle_id.as_str())
        .bind(fields.app_version.as_str())
        .bind(fields.is_published)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update game {id}"))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: GameId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM games WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete game {id}"))?;
        Ok(result.rows_affected())
    }
}
