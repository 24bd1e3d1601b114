use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    config::HostIdentity,
    dto::{
        common::PromptSummary,
        host::{
            BarSummary, CreateGameNightRequest, CreatePromptRequest, EnsureBarRequest,
            GameNightDetail, GameNightSummary, OpenPromptRequest, ResolutionSummary,
            ResolvePromptRequest,
        },
    },
    error::{AppError, ServiceError},
    services::{game_night_service, prompt_service, resolution_service},
    state::SharedState,
};

const HOST_TOKEN_HEADER: &str = "x-host-token";

/// Host endpoints for running game nights and driving prompts.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/host/bars", post(ensure_bar))
        .route("/host/game-nights", post(create_game_night))
        .route("/host/game-nights/{id}", get(game_night_detail))
        .route("/host/game-nights/{id}/end", post(end_game_night))
        .route("/host/prompts", post(create_prompt))
        .route("/host/prompts/{id}/open", post(open_prompt))
        .route("/host/prompts/{id}/lock", post(lock_prompt))
        .route("/host/prompts/{id}/resolve", post(resolve_prompt))
        .route("/host/prompts/{id}/void", post(void_prompt))
        .route("/host/prompts/{id}/reopen", post(reopen_prompt))
        .route_layer(middleware::from_fn_with_state(state, require_host_token))
}

/// Fetch the calling host's bar, creating it on first use.
#[utoipa::path(
    post,
    path = "/host/bars",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token")),
    request_body = EnsureBarRequest,
    responses(
        (status = 200, description = "Bar of the calling host", body = BarSummary),
        (status = 401, description = "Missing or unknown host token")
    )
)]
pub async fn ensure_bar(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Valid(Json(payload)): Valid<Json<EnsureBarRequest>>,
) -> Result<Json<BarSummary>, AppError> {
    Ok(Json(
        game_night_service::ensure_bar(&state, &host, payload).await?,
    ))
}

/// Schedule a game night.
#[utoipa::path(
    post,
    path = "/host/game-nights",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token")),
    request_body = CreateGameNightRequest,
    responses(
        (status = 201, description = "Game night created", body = GameNightSummary),
        (status = 403, description = "Bar belongs to another host"),
        (status = 409, description = "Join code already in use")
    )
)]
pub async fn create_game_night(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Valid(Json(payload)): Valid<Json<CreateGameNightRequest>>,
) -> Result<(StatusCode, Json<GameNightSummary>), AppError> {
    let game_night = game_night_service::create_game_night(&state, &host, payload).await?;
    Ok((StatusCode::CREATED, Json(game_night)))
}

/// Game night with all of its prompts and their results.
#[utoipa::path(
    get,
    path = "/host/game-nights/{id}",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token"),
    ("id" = Uuid, Path, description = "Game night identifier")),
    responses((status = 200, description = "Game night detail", body = GameNightDetail))
)]
pub async fn game_night_detail(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameNightDetail>, AppError> {
    Ok(Json(
        game_night_service::game_night_detail(&state, &host, id).await?,
    ))
}

/// Close a game night.
#[utoipa::path(
    post,
    path = "/host/game-nights/{id}/end",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token"),
    ("id" = Uuid, Path, description = "Game night identifier")),
    responses((status = 200, description = "Game night ended", body = GameNightSummary))
)]
pub async fn end_game_night(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameNightSummary>, AppError> {
    Ok(Json(
        game_night_service::end_game_night(&state, &host, id).await?,
    ))
}

/// Draft a prompt.
#[utoipa::path(
    post,
    path = "/host/prompts",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token")),
    request_body = CreatePromptRequest,
    responses(
        (status = 201, description = "Prompt drafted", body = PromptSummary),
        (status = 400, description = "Invalid question or options"),
        (status = 409, description = "Game night has ended")
    )
)]
pub async fn create_prompt(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Valid(Json(payload)): Valid<Json<CreatePromptRequest>>,
) -> Result<(StatusCode, Json<PromptSummary>), AppError> {
    let prompt = prompt_service::create_prompt(&state, &host, payload).await?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

/// Open a draft prompt for answers.
#[utoipa::path(
    post,
    path = "/host/prompts/{id}/open",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token"),
    ("id" = Uuid, Path, description = "Prompt identifier")),
    request_body = OpenPromptRequest,
    responses(
        (status = 200, description = "Prompt opened", body = PromptSummary),
        (status = 409, description = "Prompt is not a draft")
    )
)]
pub async fn open_prompt(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<OpenPromptRequest>>,
) -> Result<Json<PromptSummary>, AppError> {
    Ok(Json(
        prompt_service::open_prompt(&state, &host, id, payload).await?,
    ))
}

/// Stop accepting answers.
#[utoipa::path(
    post,
    path = "/host/prompts/{id}/lock",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token"),
    ("id" = Uuid, Path, description = "Prompt identifier")),
    responses(
        (status = 200, description = "Prompt locked", body = PromptSummary),
        (status = 409, description = "Prompt is not open")
    )
)]
pub async fn lock_prompt(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromptSummary>, AppError> {
    Ok(Json(prompt_service::lock_prompt(&state, &host, id).await?))
}

/// Declare the correct option and score every answer.
#[utoipa::path(
    post,
    path = "/host/prompts/{id}/resolve",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token"),
    ("id" = Uuid, Path, description = "Prompt identifier")),
    request_body = ResolvePromptRequest,
    responses(
        (status = 200, description = "Prompt resolved", body = ResolutionSummary),
        (status = 400, description = "Option does not belong to the prompt"),
        (status = 409, description = "Prompt cannot be resolved from its state")
    )
)]
pub async fn resolve_prompt(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolvePromptRequest>,
) -> Result<Json<ResolutionSummary>, AppError> {
    Ok(Json(
        resolution_service::resolve_prompt(&state, &host, id, payload).await?,
    ))
}

/// Cancel a prompt and drop its results.
#[utoipa::path(
    post,
    path = "/host/prompts/{id}/void",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token"),
    ("id" = Uuid, Path, description = "Prompt identifier")),
    responses(
        (status = 200, description = "Prompt voided", body = PromptSummary),
        (status = 409, description = "Prompt is already void")
    )
)]
pub async fn void_prompt(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<PromptSummary>, AppError> {
    Ok(Json(prompt_service::void_prompt(&state, &host, id).await?))
}

/// Give a locked or resolved prompt a fresh answer window.
#[utoipa::path(
    post,
    path = "/host/prompts/{id}/reopen",
    tag = "host",
    params(("X-Host-Token" = String, Header, description = "Host API token"),
    ("id" = Uuid, Path, description = "Prompt identifier")),
    request_body = OpenPromptRequest,
    responses(
        (status = 200, description = "Prompt reopened", body = PromptSummary),
        (status = 409, description = "Prompt is not locked or resolved")
    )
)]
pub async fn reopen_prompt(
    State(state): State<SharedState>,
    Extension(host): Extension<HostIdentity>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<OpenPromptRequest>>,
) -> Result<Json<PromptSummary>, AppError> {
    Ok(Json(
        prompt_service::reopen_prompt(&state, &host, id, payload).await?,
    ))
}

async fn require_host_token(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let host = req
        .headers()
        .get(HOST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|token| state.config().host_for_token(token.trim()))
        .ok_or(ServiceError::NotAuthenticated)?;

    req.extensions_mut().insert(host);
    Ok(next.run(req).await)
}
