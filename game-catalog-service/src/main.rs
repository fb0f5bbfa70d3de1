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

mod import;
mod store;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use catalog_common::{
    CreateGameRequest, DeleteGameResponse, GameDraft, GameFilter, GameId, GameRecord,
    SearchGamesRequest, UpdateGameRequest,
};
use lambda_http::run as lambda_run;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::{
    import::{HttpSourceFetcher, ImportSources, LookupKeyPolicy, SourceFetcher, run_import},
    store::{GameStore, InMemoryGameStore, SqliteGameStore},
};

#[derive(Clone)]
struct AppState {
    store: Arc<dyn GameStore>,
    fetcher: Arc<dyn SourceFetcher>,
    sources: ImportSources,
    lookup_policy: LookupKeyPolicy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "game_catalog_service=debug,tower_http=info".to_string()),
        )
        .init();

    let state = AppState {
        store: connect_store_from_env().await?,
        fetcher: Arc::new(HttpSourceFetcher::default()),
        sources: ImportSources::from_env(),
        lookup_policy: LookupKeyPolicy::from_env()?,
    };
    info!(
        ios_url = %state.sources.ios_url,
        android_url = %state.sources.android_url,
        lookup_policy = ?state.lookup_policy,
        "configured top list import"
    );

    let app = build_router(state, static_dir_from_env());

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("AWS Lambda runtime detected; running game-catalog-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = parse_bind_addr("GAME_CATALOG_BIND", "0.0.0.0:3000")?;
    info!(%bind_addr, "game-catalog-service listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn connect_store_from_env() -> anyhow::Result<Arc<dyn GameStore>> {
    let Some(database_url) = std::env::var("DATABASE_URL")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        warn!("DATABASE_URL not set; games are kept in memory and lost on restart");
        return Ok(Arc::new(InMemoryGameStore::default()));
    };

    let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
        Ok(value) => value
            .trim()
            .parse::<u32>()
            .context("invalid DATABASE_MAX_CONNECTIONS")?,
        Err(_) => 5,
    };

    let store = SqliteGameStore::connect(&database_url, max_connections).await?;
    Ok(Arc::new(store))
}

fn static_dir_from_env() -> Option<PathBuf> {
    std::env::var("STATIC_DIR")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/games",
            get(list_games_handler).post(create_game_handler),
        )
        .route("/api/games/search", post(search_games_handler))
        .route("/api/games/populate", post(populate_games_handler))
        .route(
            "/api/games/{id}",
            get(get_game_handler)
                .put(update_game_handler)
                .delete(delete_game_handler),
        )
        .with_state(state);

    let router = match static_dir {
        Some(dir) => {
            info!(static_dir = %dir.display(), "serving static files");
            router.fallback_service(ServeDir::new(dir))
        }
        None => router,
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": "game-catalog-service"}))
}

async fn list_games_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<GameRecord>>, ApiError> {
    let games = state
        .store
        .find_all(&GameFilter::all())
        .await
        .map_err(|error| ApiError::internal(format!("failed to query games: {error:#}")))?;
    Ok(Json(games))
}

async fn get_game_handler(
    State(state): State<AppState>,
    Path(id): Path<GameId>,
) -> Result<Json<GameRecord>, ApiError> {
    let game = state
        .store
        .find_by_key(id)
        .await
        .map_err(|error| ApiError::internal(format!("failed to load game {id}: {error:#}")))?
        .ok_or_else(|| ApiError::not_found(format!("game {id} not found")))?;
    Ok(Json(game))
}

async fn create_game_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<GameRecord>, ApiError> {
    let fields = request.into_fields().map_err(ApiError::bad_request)?;
    let game = state
        .store
        .create(&GameDraft::new(fields))
        .await
        .map_err(|error| ApiError::bad_request(format!("failed to create game: {error:#}")))?
        .ok_or_else(|| ApiError::bad_request("game was not created"))?;

    info!(game_id = game.id, name = %game.fields.name, "created game");
    Ok(Json(game))
}

async fn update_game_handler(
    State(state): State<AppState>,
    Path(id): Path<GameId>,
    Json(request): Json<UpdateGameRequest>,
) -> Result<Json<GameRecord>, ApiError> {
    let update_error =
        |error: anyhow::Error| ApiError::bad_request(format!("failed to update game {id}: {error:#}"));

    let existing = state
        .store
        .find_by_key(id)
        .await
        .map_err(update_error)?
        .ok_or_else(|| ApiError::bad_request(format!("game {id} not found")))?;

    let fields = request.apply_to(&existing.fields);
    let affected = state
        .store
        .update(id, &GameDraft::new(fields))
        .await
        .map_err(update_error)?;
    if affected == 0 {
        return Err(ApiError::bad_request(format!("game {id} not found")));
    }

    let game = state
        .store
        .find_by_key(id)
        .await
        .map_err(update_error)?
        .ok_or_else(|| ApiError::bad_request(format!("game {id} not found")))?;

    info!(game_id = id, "updated game");
    Ok(Json(game))
}

async fn delete_game_handler(
    State(state): State<AppState>,
    Path(id): Path<GameId>,
) -> Result<Json<DeleteGameResponse>, ApiError> {
    let affected = state
        .store
        .delete(id)
        .await
        .map_err(|error| ApiError::bad_request(format!("failed to delete game {id}: {error:#}")))?;
    if affected == 0 {
        return Err(ApiError::bad_request(format!("game {id} not found")));
    }

    info!(game_id = id, "deleted game");
    Ok(Json(DeleteGameResponse { id }))
}

async fn search_games_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchGamesRequest>,
) -> Result<Json<Vec<GameRecord>>, ApiError> {
    let filter = request.into_filter();
    let games = state
        .store
        .find_all(&filter)
        .await
        .map_err(|error| ApiError::internal(format!("failed to search games: {error:#}")))?;
    Ok(Json(games))
}

async fn populate_games_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<GameRecord>>, ApiError> {
    let summary = run_import(
        state.store.as_ref(),
        state.fetcher.as_ref(),
        &state.sources,
        state.lookup_policy,
    )
    .await
    .map_err(|error| ApiError::internal(format!("top list import failed: {error}")))?;

    debug!(report = ?summary.report, games = summary.games.len(), "populate finished");
    Ok(Json(summary.games))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::test_support::{StaticFetcher, test_sources};
    use axum::extract::{Path, State};
    use serde_json::json;

    fn app_state_with(fetcher: StaticFetcher) -> AppState {
        AppState {
            store: Arc::new(InMemoryGameStore::default()),
            fetcher: Arc::new(fetcher),
            sources: test_sources(),
            lookup_policy: LookupKeyPolicy::OriginalId,
        }
    }

    fn app_state() -> AppState {
        app_state_with(StaticFetcher::default())
    }

    fn create_request(name: &str, platform: &str) -> CreateGameRequest {
        CreateGameRequest {
            publisher_id: Some("pub-1".to_string()),
            name: Some(name.to_string()),
            platform: Some(platform.to_string()),
            store_id: Some("store-1".to_string()),
            bundle_id: Some("com.example.game".to_string()),
            app_version: Some("1.0.0".to_string()),
            is_published: Some(true),
        }
    }

    async fn create(state: &AppState, name: &str, platform: &str) -> GameRecord {
        create_game_handler(State(state.clone()), Json(create_request(name, platform)))
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn health_reports_service_name() {
        let body = health().await.0;
        assert_eq!(body["ok"], true);
        assert_eq!(body["service"], "game-catalog-service");
    }

    #[tokio::test]
    async fn create_game_assigns_id_and_lists_it() {
        let state = app_state();
        let created = create(&state, "Super Mario Run", "ios").await;
        assert_eq!(created.id, 1);
        assert_eq!(created.fields.bundle_id, "com.example.game");
        assert!(created.fields.is_published);

        let listed = list_games_handler(State(state.clone())).await.unwrap().0;
        assert_eq!(listed, vec![created.clone()]);

        let fetched = get_game_handler(State(state), Path(created.id))
            .await
            .unwrap()
            .0;
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_game_rejects_missing_fields() {
        let state = app_state();
        let mut request = create_request("Game", "ios");
        request.app_version = None;

        let err = create_game_handler(State(state), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("appVersion"));
    }

    #[tokio::test]
    async fn get_game_returns_not_found_for_unknown_id() {
        let state = app_state();
        let err = get_game_handler(State(state), Path(404)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_game_changes_only_provided_fields() {
        let state = app_state();
        let created = create(&state, "Old Name", "ios").await;

        let updated = update_game_handler(
            State(state.clone()),
            Path(created.id),
            Json(UpdateGameRequest {
                name: Some("New Name".to_string()),
                is_published: Some(false),
                ..UpdateGameRequest::default()
            }),
        )
        .await
        .unwrap()
        .0;

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.fields.name, "New Name");
        assert!(!updated.fields.is_published);
        assert_eq!(updated.fields.platform, "ios");
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn update_game_rejects_unknown_id() {
        let state = app_state();
        let err = update_game_handler(
            State(state),
            Path(77),
            Json(UpdateGameRequest::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "game 77 not found");
    }

    #[tokio::test]
    async fn delete_game_removes_record_once() {
        let state = app_state();
        let created = create(&state, "Doomed", "android").await;

        let deleted = delete_game_handler(State(state.clone()), Path(created.id))
            .await
            .unwrap()
            .0;
        assert_eq!(deleted, DeleteGameResponse { id: created.id });
        assert!(
            list_games_handler(State(state.clone()))
                .await
                .unwrap()
                .0
                .is_empty()
        );

        let err = delete_game_handler(State(state), Path(created.id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn search_filters_by_name_substring_and_platform() {
        let state = app_state();
        create(&state, "Super Mario Run", "ios").await;
        create(&state, "Mario Kart Tour", "android").await;
        create(&state, "Candy Crush", "ios").await;

        let marios = search_games_handler(
            State(state.clone()),
            Json(SearchGamesRequest {
                name: Some("Mario".to_string()),
                platform: None,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(marios.len(), 2);
        assert!(marios.iter().all(|game| game.fields.name.contains("Mario")));

        let ios_marios = search_games_handler(
            State(state.clone()),
            Json(SearchGamesRequest {
                name: Some("Mario".to_string()),
                platform: Some("ios".to_string()),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(ios_marios.len(), 1);
        assert_eq!(ios_marios[0].fields.name, "Super Mario Run");

        let everything = search_games_handler(
            State(state),
            Json(SearchGamesRequest {
                name: Some(String::new()),
                platform: None,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn populate_imports_top_lists_and_returns_all_games() {
        let sources = test_sources();
        let fetcher = StaticFetcher::new(
            &sources,
            Some(json!([[{
                "id": 42,
                "publisher_id": "p1",
                "publisher_name": "Game A",
                "os": "ios",
                "version": "1.0"
            }]])),
            Some(json!([{"appId": 7, "publisher_id": "p2", "os": "android"}])),
        );
        let state = app_state_with(fetcher);
        create(&state, "Hand Made", "ios").await;

        let games = populate_games_handler(State(state)).await.unwrap().0;

        let ids: Vec<GameId> = games.iter().map(|game| game.id).collect();
        assert_eq!(ids, vec![1, 7, 42]);
        let game_a = &games[2].fields;
        assert_eq!(game_a.publisher_id, "p1");
        assert_eq!(game_a.name, "Game A");
        assert_eq!(game_a.platform, "ios");
        assert_eq!(game_a.store_id, "p1");
        assert_eq!(game_a.bundle_id, "p1");
        assert_eq!(game_a.app_version, "1.0");
        assert!(game_a.is_published);
    }

    #[tokio::test]
    async fn populate_returns_internal_error_when_a_list_is_unavailable() {
        let sources = test_sources();
        let fetcher = StaticFetcher::new(&sources, Some(json!([{"id": 1}])), None);
        let state = app_state_with(fetcher);

        let err = populate_games_handler(State(state.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("top list import failed"));
        assert!(err.message.contains(&sources.android_url));
        assert!(
            list_games_handler(State(state))
                .await
                .unwrap()
                .0
                .is_empty()
        );
    }

    #[test]
    fn api_error_renders_json_body_with_status() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
