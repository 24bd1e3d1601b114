use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Game Night Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::host::ensure_bar,
        crate::routes::host::create_game_night,
        crate::routes::host::game_night_detail,
        crate::routes::host::end_game_night,
        crate::routes::host::create_prompt,
        crate::routes::host::open_prompt,
        crate::routes::host::lock_prompt,
        crate::routes::host::resolve_prompt,
        crate::routes::host::void_prompt,
        crate::routes::host::reopen_prompt,
        crate::routes::patron::join,
        crate::routes::patron::current_prompt,
        crate::routes::patron::submit_answer,
        crate::routes::patron::leaderboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::host::EnsureBarRequest,
            crate::dto::host::BarSummary,
            crate::dto::host::CreateGameNightRequest,
            crate::dto::host::GameNightSummary,
            crate::dto::host::GameNightDetail,
            crate::dto::host::HostPromptView,
            crate::dto::host::CreatePromptRequest,
            crate::dto::host::OpenPromptRequest,
            crate::dto::host::ResolvePromptRequest,
            crate::dto::host::ResolutionSummary,
            crate::dto::common::PromptSummary,
            crate::dto::common::OptionView,
            crate::dto::common::CountdownView,
            crate::dto::patron::JoinRequest,
            crate::dto::patron::JoinResponse,
            crate::dto::patron::SubmitAnswerRequest,
            crate::dto::patron::SubmissionReceipt,
            crate::dto::patron::PatronPromptView,
            crate::dto::patron::CurrentPromptResponse,
            crate::dto::patron::MyPoints,
            crate::dto::patron::LeaderboardRow,
            crate::dto::patron::LeaderboardResponse,
            crate::dao::models::GameNightStatus,
            crate::dao::models::PromptKind,
            crate::state::state_machine::PromptState,
            crate::state::scoring::ScoreReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "host", description = "Game night and prompt management, authenticated by `X-Host-Token`"),
        (name = "patron", description = "Joining, answering and leaderboards, addressed by join code"),
    )
)]
pub struct ApiDoc;

#[cfg(feature = "sports-feed")]
#[derive(OpenApi)]
#[openapi(
    paths(crate::routes::feed::nba_play_by_play),
    components(schemas(crate::dto::feed::FeedMode)),
    tags((name = "feed", description = "Read-only sports data proxy")),
)]
struct FeedApiDoc;

/// Full OpenAPI document for the enabled features.
pub fn api_doc() -> utoipa::openapi::OpenApi {
    #[allow(unused_mut)]
    let mut doc = ApiDoc::openapi();
    #[cfg(feature = "sports-feed")]
    doc.merge(FeedApiDoc::openapi());
    doc
}
