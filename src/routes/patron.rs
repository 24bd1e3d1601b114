use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::patron::{
        CurrentPromptResponse, JoinRequest, JoinResponse, LeaderboardResponse, PatronQuery,
        SubmissionReceipt, SubmitAnswerRequest,
    },
    error::AppError,
    services::{game_night_service, prompt_service},
    state::SharedState,
};

/// Patron endpoints, addressed by the game night's join code.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/g/{code}/join", post(join))
        .route("/g/{code}/prompt", get(current_prompt))
        .route("/g/{code}/submissions", post(submit_answer))
        .route("/g/{code}/leaderboard", get(leaderboard))
}

/// Join a game night under a nickname.
#[utoipa::path(
    post,
    path = "/g/{code}/join",
    tag = "patron",
    params(("code" = String, Path, description = "Join code, case-insensitive")),
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Patron registered", body = JoinResponse),
        (status = 404, description = "Unknown join code"),
        (status = 409, description = "Game night has ended")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    let joined = game_night_service::join_game_night(&state, &code, payload).await?;
    Ok((StatusCode::CREATED, Json(joined)))
}

/// Latest prompt of the game night with its countdown.
#[utoipa::path(
    get,
    path = "/g/{code}/prompt",
    tag = "patron",
    params(("code" = String, Path, description = "Join code, case-insensitive"), PatronQuery),
    responses((status = 200, description = "Current prompt", body = CurrentPromptResponse))
)]
pub async fn current_prompt(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<PatronQuery>,
) -> Result<Json<CurrentPromptResponse>, AppError> {
    Ok(Json(
        prompt_service::current_prompt(&state, &code, query.patron_id).await?,
    ))
}

/// Answer an open prompt. One answer per patron and prompt.
#[utoipa::path(
    post,
    path = "/g/{code}/submissions",
    tag = "patron",
    params(("code" = String, Path, description = "Join code, case-insensitive")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 201, description = "Answer stored", body = SubmissionReceipt),
        (status = 400, description = "Option does not belong to the prompt"),
        (status = 409, description = "Prompt closed or answer already submitted")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    let receipt = prompt_service::submit_answer(&state, &code, payload).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Ranked totals of the game night.
#[utoipa::path(
    get,
    path = "/g/{code}/leaderboard",
    tag = "patron",
    params(("code" = String, Path, description = "Join code, case-insensitive"), PatronQuery),
    responses((status = 200, description = "Leaderboard", body = LeaderboardResponse))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<PatronQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(
        game_night_service::leaderboard(&state, &code, query.patron_id).await?,
    ))
}
