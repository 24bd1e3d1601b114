//! Bars, game nights, patrons and leaderboards.

use std::sync::Arc;

use rand::Rng;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::HostIdentity,
    dao::{
        models::{BarEntity, GameNightEntity, GameNightStatus, LeaderboardRowEntity, PatronEntity},
        prompt_store::PromptStore,
    },
    dto::{
        host::{
            BarSummary, CreateGameNightRequest, EnsureBarRequest, GameNightDetail,
            GameNightSummary, HostPromptView,
        },
        common::PromptSummary,
        patron::{JoinRequest, JoinResponse, LeaderboardResponse, LeaderboardRow, MAX_NICKNAME_LEN},
        validation::{MIN_GAME_CODE_LEN, normalize_game_code},
    },
    error::ServiceError,
    services::audit::{AuditKind, log_event},
    state::SharedState,
};

const DEFAULT_SPORT: &str = "NBA";
const GENERATED_CODE_LEN: usize = 6;
const GENERATED_CODE_ATTEMPTS: u32 = 5;
/// Unambiguous characters for generated codes (no 0/O or 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn generate_game_code() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Load a game night and check that `host` owns it.
pub(crate) async fn load_owned_game_night(
    store: &Arc<dyn PromptStore>,
    host: &HostIdentity,
    id: Uuid,
) -> Result<GameNightEntity, ServiceError> {
    let game_night = store
        .find_game_night(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game night `{id}` not found")))?;

    if game_night.owner_user_id != host.user_id {
        return Err(ServiceError::NotAuthorized(format!(
            "game night `{id}` belongs to another host"
        )));
    }
    Ok(game_night)
}

/// Resolve a join code typed by a patron.
pub(crate) async fn load_game_night_by_code(
    store: &Arc<dyn PromptStore>,
    code: &str,
) -> Result<GameNightEntity, ServiceError> {
    let normalized = normalize_game_code(code);
    if normalized.len() < MIN_GAME_CODE_LEN {
        return Err(ServiceError::NotFound(format!("game code `{code}` not found")));
    }

    store
        .find_game_night_by_code(normalized)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game code `{code}` not found")))
}

pub(crate) fn ensure_active(game_night: &GameNightEntity) -> Result<(), ServiceError> {
    match game_night.status {
        GameNightStatus::Active => Ok(()),
        GameNightStatus::Ended => Err(ServiceError::InvalidState(format!(
            "game night `{}` has ended",
            game_night.code
        ))),
    }
}

/// Return the host's bar, creating it on first use.
pub async fn ensure_bar(
    state: &SharedState,
    host: &HostIdentity,
    payload: EnsureBarRequest,
) -> Result<BarSummary, ServiceError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("bar name required".into()));
    }

    let store = state.require_store().await?;
    if let Some(existing) = store.find_bar_by_owner(host.user_id.clone()).await? {
        debug!(bar_id = %existing.id, host = %host.user_id, "reusing existing bar");
        return Ok(existing.into());
    }

    let bar = BarEntity {
        id: Uuid::new_v4(),
        owner_user_id: host.user_id.clone(),
        name: name.to_owned(),
        created_at: state.now(),
    };
    store.insert_bar(bar.clone()).await?;
    info!(bar_id = %bar.id, host = %host.user_id, "bar created");
    Ok(bar.into())
}

/// Schedule a game night at one of the host's bars.
pub async fn create_game_night(
    state: &SharedState,
    host: &HostIdentity,
    payload: CreateGameNightRequest,
) -> Result<GameNightSummary, ServiceError> {
    let explicit_code = match payload.code.as_deref() {
        Some(raw) => {
            let code = normalize_game_code(raw);
            if code.len() < MIN_GAME_CODE_LEN {
                return Err(ServiceError::InvalidInput(format!(
                    "game code must be at least {MIN_GAME_CODE_LEN} characters"
                )));
            }
            Some(code)
        }
        None => None,
    };

    let store = state.require_store().await?;
    let bar = store
        .find_bar(payload.bar_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("bar `{}` not found", payload.bar_id)))?;
    if bar.owner_user_id != host.user_id {
        return Err(ServiceError::NotAuthorized(format!(
            "bar `{}` belongs to another host",
            bar.id
        )));
    }

    let sport = payload
        .sport
        .as_deref()
        .map(str::trim)
        .filter(|sport| !sport.is_empty())
        .unwrap_or(DEFAULT_SPORT)
        .to_owned();
    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_owned);

    let mut game_night = GameNightEntity {
        id: Uuid::new_v4(),
        bar_id: bar.id,
        owner_user_id: host.user_id.clone(),
        code: String::new(),
        title,
        sport,
        external_game_id: payload.external_game_id,
        status: GameNightStatus::Active,
        created_at: state.now(),
        ended_at: None,
    };

    match explicit_code {
        Some(code) => {
            game_night.code = code;
            if !store.insert_game_night(game_night.clone()).await? {
                return Err(ServiceError::InvalidState(format!(
                    "game code `{}` is already in use",
                    game_night.code
                )));
            }
        }
        None => {
            let mut inserted = false;
            for _ in 0..GENERATED_CODE_ATTEMPTS {
                game_night.code = generate_game_code();
                if store.insert_game_night(game_night.clone()).await? {
                    inserted = true;
                    break;
                }
                debug!(code = %game_night.code, "generated game code collided; retrying");
            }
            if !inserted {
                return Err(ServiceError::InvalidState(
                    "could not allocate a free game code".into(),
                ));
            }
        }
    }

    info!(game_night_id = %game_night.id, code = %game_night.code, "game night created");
    log_event(
        state,
        AuditKind::GameNightCreated,
        Some(&host.user_id),
        Some(game_night.id),
        json!({ "code": game_night.code, "sport": game_night.sport }),
    )
    .await;

    Ok(game_night.into())
}

/// Close a game night. Ending an ended game night is a no-op.
pub async fn end_game_night(
    state: &SharedState,
    host: &HostIdentity,
    id: Uuid,
) -> Result<GameNightSummary, ServiceError> {
    let store = state.require_store().await?;
    let mut game_night = load_owned_game_night(&store, host, id).await?;
    if game_night.status == GameNightStatus::Ended {
        return Ok(game_night.into());
    }

    let ended_at = state.now();
    store.end_game_night(id, ended_at).await?;
    game_night.status = GameNightStatus::Ended;
    game_night.ended_at = Some(ended_at);

    info!(game_night_id = %id, "game night ended");
    log_event(
        state,
        AuditKind::GameNightEnded,
        Some(&host.user_id),
        Some(id),
        json!({ "code": game_night.code }),
    )
    .await;

    Ok(game_night.into())
}

/// Host overview of a game night and all its prompts.
pub async fn game_night_detail(
    state: &SharedState,
    host: &HostIdentity,
    id: Uuid,
) -> Result<GameNightDetail, ServiceError> {
    let store = state.require_store().await?;
    let game_night = load_owned_game_night(&store, host, id).await?;

    let mut prompts = Vec::new();
    for prompt in store.find_prompts(id).await? {
        let options = store.find_options(prompt.id).await?;
        let resolution = store.find_resolution(prompt.id).await?;
        let submission_count = store.find_submissions(prompt.id).await?.len();
        let score_count = store.find_scores(prompt.id).await?.len();

        prompts.push(HostPromptView {
            prompt: PromptSummary::from_entity(&prompt, &options),
            correct_option_id: resolution.map(|resolution| resolution.correct_option_id),
            submission_count,
            score_count,
        });
    }

    Ok(GameNightDetail {
        game_night: game_night.into(),
        prompts,
    })
}

/// Register a patron on a running game night.
pub async fn join_game_night(
    state: &SharedState,
    code: &str,
    payload: JoinRequest,
) -> Result<JoinResponse, ServiceError> {
    let nickname = payload.nickname.trim();
    if nickname.is_empty() || nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "nickname must be between 1 and {MAX_NICKNAME_LEN} characters"
        )));
    }

    let store = state.require_store().await?;
    let game_night = load_game_night_by_code(&store, code).await?;
    ensure_active(&game_night)?;

    let patron = PatronEntity {
        id: Uuid::new_v4(),
        game_night_id: game_night.id,
        nickname: nickname.to_owned(),
        joined_at: state.now(),
    };
    store.insert_patron(patron.clone()).await?;

    log_event(
        state,
        AuditKind::PatronJoined,
        None,
        Some(game_night.id),
        json!({ "patron_id": patron.id, "code": game_night.code }),
    )
    .await;

    Ok(JoinResponse {
        patron_id: patron.id,
        game_night_id: game_night.id,
        code: game_night.code,
        nickname: patron.nickname,
    })
}

/// Assign competition ranks ("1, 2, 2, 4") to rows already sorted by total descending.
fn rank_rows(rows: Vec<LeaderboardRowEntity>) -> Vec<LeaderboardRow> {
    let mut ranked: Vec<LeaderboardRow> = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(previous) if previous.total_points == row.total_points => previous.rank,
            _ => index + 1,
        };
        ranked.push(LeaderboardRow {
            rank,
            patron_id: row.patron_id,
            nickname: row.nickname,
            total_points: row.total_points,
        });
    }
    ranked
}

/// Top of the leaderboard plus the requesting patron's own line.
pub async fn leaderboard(
    state: &SharedState,
    code: &str,
    patron_id: Option<Uuid>,
) -> Result<LeaderboardResponse, ServiceError> {
    let store = state.require_store().await?;
    let game_night = load_game_night_by_code(&store, code).await?;

    let ranked = rank_rows(store.leaderboard(game_night.id).await?);
    let me = patron_id.and_then(|id| ranked.iter().find(|row| row.patron_id == id).cloned());
    let rows = ranked
        .into_iter()
        .take(state.config().leaderboard_size())
        .collect();

    Ok(LeaderboardResponse { rows, me })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(nickname: &str, total_points: u64) -> LeaderboardRowEntity {
        LeaderboardRowEntity {
            patron_id: Uuid::new_v4(),
            nickname: nickname.into(),
            total_points,
        }
    }

    #[test]
    fn ties_share_rank() {
        let ranked = rank_rows(vec![
            row("Ada", 18),
            row("Bob", 12),
            row("Cy", 12),
            row("Di", 0),
        ]);
        let ranks: Vec<usize> = ranked.iter().map(|row| row.rank).collect();
        assert_eq!(ranks, vec![1, 2, 2, 4]);
    }

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..32 {
            let code = generate_game_code();
            assert_eq!(code.len(), GENERATED_CODE_LEN);
            assert_eq!(normalize_game_code(&code), code);
            assert!(!code.contains('0') && !code.contains('O'));
        }
    }
}
