use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{dto::feed::FeedMode, error::AppError, services::feed_service, state::SharedState};

/// Read-only play-by-play proxy.
pub fn router() -> Router<SharedState> {
    Router::new().route("/feed/{mode}/nba/pbp/{game_id}", get(nba_play_by_play))
}

/// Raw NBA play-by-play document for a game, in replay or live mode.
#[utoipa::path(
    get,
    path = "/feed/{mode}/nba/pbp/{game_id}",
    tag = "feed",
    params(
        ("mode" = FeedMode, Path, description = "`replay` or `live`"),
        ("game_id" = i64, Path, description = "Feed game identifier")
    ),
    responses(
        (status = 200, description = "Play-by-play document", body = serde_json::Value),
        (status = 502, description = "Feed unavailable or misconfigured")
    )
)]
pub async fn nba_play_by_play(
    State(state): State<SharedState>,
    Path((mode, game_id)): Path<(FeedMode, i64)>,
) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(
        feed_service::play_by_play(&state, mode, game_id).await?,
    ))
}
