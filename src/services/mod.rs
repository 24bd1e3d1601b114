/// Audit trail of host and patron actions.
pub mod audit;
/// OpenAPI documentation generation.
pub mod documentation;
/// Read-only sports data feed proxy.
#[cfg(feature = "sports-feed")]
pub mod feed_service;
/// Bars, game nights, patrons and leaderboards.
pub mod game_night_service;
/// Health check service.
pub mod health_service;
/// Prompt authoring, lifecycle transitions and submissions.
pub mod prompt_service;
/// Resolution and scoring of prompts.
pub mod resolution_service;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
