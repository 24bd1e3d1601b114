use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{
        AnalyticEventEntity, BarEntity, GameNightEntity, GameNightStatus, PatronEntity,
        PromptEntity, PromptKind, PromptOptionEntity, ResolutionEntity, ScoreEntity,
        SubmissionEntity,
    },
    state::{scoring::ScoreReason, state_machine::PromptState},
};

pub const BARS: &str = "bars";
pub const GAME_NIGHTS: &str = "game_nights";
pub const PROMPTS: &str = "prompts";
pub const PROMPT_OPTIONS: &str = "prompt_options";
pub const PATRONS: &str = "patrons";
pub const SUBMISSIONS: &str = "submissions";
pub const RESOLUTIONS: &str = "resolutions";
pub const SCORES: &str = "scores";
pub const EVENTS: &str = "analytics_events";

/// Ids are stored as hyphenated strings so documents stay readable from the shell.
pub fn id_str(id: Uuid) -> String {
    id.hyphenated().to_string()
}

fn parse_id(collection: &'static str, value: String) -> MongoResult<Uuid> {
    Uuid::parse_str(&value).map_err(|_| MongoDaoError::MalformedId { collection, value })
}

fn to_bson_time(value: std::time::SystemTime) -> DateTime {
    DateTime::from_system_time(value)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBarDocument {
    #[serde(rename = "_id")]
    id: String,
    owner_user_id: String,
    name: String,
    created_at: DateTime,
}

impl From<BarEntity> for MongoBarDocument {
    fn from(value: BarEntity) -> Self {
        Self {
            id: id_str(value.id),
            owner_user_id: value.owner_user_id,
            name: value.name,
            created_at: to_bson_time(value.created_at),
        }
    }
}

impl TryFrom<MongoBarDocument> for BarEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoBarDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(BARS, value.id)?,
            owner_user_id: value.owner_user_id,
            name: value.name,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameNightDocument {
    #[serde(rename = "_id")]
    id: String,
    bar_id: String,
    owner_user_id: String,
    code: String,
    title: Option<String>,
    sport: String,
    external_game_id: Option<i64>,
    status: GameNightStatus,
    created_at: DateTime,
    ended_at: Option<DateTime>,
}

impl From<GameNightEntity> for MongoGameNightDocument {
    fn from(value: GameNightEntity) -> Self {
        Self {
            id: id_str(value.id),
            bar_id: id_str(value.bar_id),
            owner_user_id: value.owner_user_id,
            code: value.code,
            title: value.title,
            sport: value.sport,
            external_game_id: value.external_game_id,
            status: value.status,
            created_at: to_bson_time(value.created_at),
            ended_at: value.ended_at.map(to_bson_time),
        }
    }
}

impl TryFrom<MongoGameNightDocument> for GameNightEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameNightDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(GAME_NIGHTS, value.id)?,
            bar_id: parse_id(GAME_NIGHTS, value.bar_id)?,
            owner_user_id: value.owner_user_id,
            code: value.code,
            title: value.title,
            sport: value.sport,
            external_game_id: value.external_game_id,
            status: value.status,
            created_at: value.created_at.to_system_time(),
            ended_at: value.ended_at.map(DateTime::to_system_time),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPromptDocument {
    #[serde(rename = "_id")]
    id: String,
    game_night_id: String,
    created_by_user_id: String,
    kind: PromptKind,
    question: String,
    over_under_line: Option<f64>,
    state: PromptState,
    opens_at: Option<DateTime>,
    locks_at: Option<DateTime>,
    resolved_at: Option<DateTime>,
    created_at: DateTime,
}

impl From<PromptEntity> for MongoPromptDocument {
    fn from(value: PromptEntity) -> Self {
        Self {
            id: id_str(value.id),
            game_night_id: id_str(value.game_night_id),
            created_by_user_id: value.created_by_user_id,
            kind: value.kind,
            question: value.question,
            over_under_line: value.over_under_line,
            state: value.state,
            opens_at: value.opens_at.map(to_bson_time),
            locks_at: value.locks_at.map(to_bson_time),
            resolved_at: value.resolved_at.map(to_bson_time),
            created_at: to_bson_time(value.created_at),
        }
    }
}

impl TryFrom<MongoPromptDocument> for PromptEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPromptDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PROMPTS, value.id)?,
            game_night_id: parse_id(PROMPTS, value.game_night_id)?,
            created_by_user_id: value.created_by_user_id,
            kind: value.kind,
            question: value.question,
            over_under_line: value.over_under_line,
            state: value.state,
            opens_at: value.opens_at.map(DateTime::to_system_time),
            locks_at: value.locks_at.map(DateTime::to_system_time),
            resolved_at: value.resolved_at.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoOptionDocument {
    #[serde(rename = "_id")]
    id: String,
    prompt_id: String,
    label: String,
    position: u32,
}

impl From<PromptOptionEntity> for MongoOptionDocument {
    fn from(value: PromptOptionEntity) -> Self {
        Self {
            id: id_str(value.id),
            prompt_id: id_str(value.prompt_id),
            label: value.label,
            position: value.position,
        }
    }
}

impl TryFrom<MongoOptionDocument> for PromptOptionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoOptionDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PROMPT_OPTIONS, value.id)?,
            prompt_id: parse_id(PROMPT_OPTIONS, value.prompt_id)?,
            label: value.label,
            position: value.position,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPatronDocument {
    #[serde(rename = "_id")]
    id: String,
    game_night_id: String,
    nickname: String,
    joined_at: DateTime,
}

impl From<PatronEntity> for MongoPatronDocument {
    fn from(value: PatronEntity) -> Self {
        Self {
            id: id_str(value.id),
            game_night_id: id_str(value.game_night_id),
            nickname: value.nickname,
            joined_at: to_bson_time(value.joined_at),
        }
    }
}

impl TryFrom<MongoPatronDocument> for PatronEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoPatronDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PATRONS, value.id)?,
            game_night_id: parse_id(PATRONS, value.game_night_id)?,
            nickname: value.nickname,
            joined_at: value.joined_at.to_system_time(),
        })
    }
}

/// Keyed by a unique (prompt_id, patron_id) index; `_id` is left to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSubmissionDocument {
    prompt_id: String,
    patron_id: String,
    option_id: String,
    created_at: DateTime,
}

impl From<SubmissionEntity> for MongoSubmissionDocument {
    fn from(value: SubmissionEntity) -> Self {
        Self {
            prompt_id: id_str(value.prompt_id),
            patron_id: id_str(value.patron_id),
            option_id: id_str(value.option_id),
            created_at: to_bson_time(value.created_at),
        }
    }
}

impl TryFrom<MongoSubmissionDocument> for SubmissionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSubmissionDocument) -> MongoResult<Self> {
        Ok(Self {
            prompt_id: parse_id(SUBMISSIONS, value.prompt_id)?,
            patron_id: parse_id(SUBMISSIONS, value.patron_id)?,
            option_id: parse_id(SUBMISSIONS, value.option_id)?,
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// One resolution per prompt, so the prompt id doubles as `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoResolutionDocument {
    #[serde(rename = "_id")]
    prompt_id: String,
    correct_option_id: String,
    resolved_by_user_id: String,
    resolved_at: DateTime,
}

impl From<ResolutionEntity> for MongoResolutionDocument {
    fn from(value: ResolutionEntity) -> Self {
        Self {
            prompt_id: id_str(value.prompt_id),
            correct_option_id: id_str(value.correct_option_id),
            resolved_by_user_id: value.resolved_by_user_id,
            resolved_at: to_bson_time(value.resolved_at),
        }
    }
}

impl TryFrom<MongoResolutionDocument> for ResolutionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoResolutionDocument) -> MongoResult<Self> {
        Ok(Self {
            prompt_id: parse_id(RESOLUTIONS, value.prompt_id)?,
            correct_option_id: parse_id(RESOLUTIONS, value.correct_option_id)?,
            resolved_by_user_id: value.resolved_by_user_id,
            resolved_at: value.resolved_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScoreDocument {
    pub prompt_id: String,
    pub game_night_id: String,
    pub patron_id: String,
    points: u32,
    reason: ScoreReason,
}

impl From<ScoreEntity> for MongoScoreDocument {
    fn from(value: ScoreEntity) -> Self {
        Self {
            prompt_id: id_str(value.prompt_id),
            game_night_id: id_str(value.game_night_id),
            patron_id: id_str(value.patron_id),
            points: value.points,
            reason: value.reason,
        }
    }
}

impl TryFrom<MongoScoreDocument> for ScoreEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoScoreDocument) -> MongoResult<Self> {
        Ok(Self {
            prompt_id: parse_id(SCORES, value.prompt_id)?,
            game_night_id: parse_id(SCORES, value.game_night_id)?,
            patron_id: parse_id(SCORES, value.patron_id)?,
            points: value.points,
            reason: value.reason,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    id: String,
    kind: String,
    user_id: Option<String>,
    game_night_id: Option<String>,
    payload: serde_json::Value,
    created_at: DateTime,
}

impl From<AnalyticEventEntity> for MongoEventDocument {
    fn from(value: AnalyticEventEntity) -> Self {
        Self {
            id: id_str(value.id),
            kind: value.kind,
            user_id: value.user_id,
            game_night_id: value.game_night_id.map(id_str),
            payload: value.payload,
            created_at: to_bson_time(value.created_at),
        }
    }
}

/// Parse every document, failing on the first malformed one.
pub fn into_entities<D, E>(documents: Vec<D>) -> MongoResult<Vec<E>>
where
    E: TryFrom<D, Error = MongoDaoError>,
{
    documents.into_iter().map(E::try_from).collect()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn prompt_document_keeps_window_bounds() {
        let opens_at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
        let prompt = PromptEntity {
            id: Uuid::new_v4(),
            game_night_id: Uuid::new_v4(),
            created_by_user_id: "host-1".into(),
            kind: PromptKind::OverUnder,
            question: "Total points over 220.5?".into(),
            over_under_line: Some(220.5),
            state: PromptState::Open,
            opens_at: Some(opens_at),
            locks_at: Some(opens_at + Duration::from_secs(30)),
            resolved_at: None,
            created_at: opens_at,
        };

        let document = MongoPromptDocument::from(prompt.clone());
        let back = PromptEntity::try_from(document).unwrap();
        assert_eq!(back, prompt);
    }

    #[test]
    fn malformed_id_is_reported() {
        let document = MongoPatronDocument {
            id: "not-a-uuid".into(),
            game_night_id: id_str(Uuid::new_v4()),
            nickname: "Ada".into(),
            joined_at: DateTime::now(),
        };

        match PatronEntity::try_from(document) {
            Err(MongoDaoError::MalformedId { collection, value }) => {
                assert_eq!(collection, PATRONS);
                assert_eq!(value, "not-a-uuid");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
