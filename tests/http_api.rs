use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use game_night_back::{
    config::AppConfig, dao::prompt_store::memory::MemoryPromptStore, routes, state::AppState,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const HOST_TOKEN: &str = "host-secret";
const OTHER_TOKEN: &str = "other-secret";

async fn app() -> Router {
    let config = AppConfig::default()
        .with_host_token(HOST_TOKEN, "host-1")
        .with_host_token(OTHER_TOKEN, "host-2");
    let state = AppState::new(config);
    state.install_store(Arc::new(MemoryPromptStore::new())).await;
    routes::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header("x-host-token", token);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn healthcheck_reports_ok_with_a_store() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/healthcheck", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn degraded_state_answers_503() {
    let app = routes::router(AppState::new(AppConfig::default()));
    let (status, body) = send(&app, "GET", "/g/ABCD/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn host_routes_require_a_known_token() {
    let app = app().await;
    let payload = json!({ "name": "The Corner" });

    let (missing, _) = send(&app, "POST", "/host/bars", None, Some(payload.clone())).await;
    assert_eq!(missing, StatusCode::UNAUTHORIZED);

    let (unknown, _) = send(&app, "POST", "/host/bars", Some("nope"), Some(payload.clone())).await;
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);

    let (ok, bar) = send(&app, "POST", "/host/bars", Some(HOST_TOKEN), Some(payload)).await;
    assert_eq!(ok, StatusCode::OK);
    assert_eq!(bar["name"], "The Corner");
}

#[tokio::test]
async fn full_round_over_http() {
    let app = app().await;

    let (_, bar) = send(&app, "POST", "/host/bars", Some(HOST_TOKEN), Some(json!({ "name": "The Corner" }))).await;
    let (status, game_night) = send(
        &app,
        "POST",
        "/host/game-nights",
        Some(HOST_TOKEN),
        Some(json!({ "bar_id": bar["id"], "code": "hoops" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(game_night["code"], "HOOPS");
    assert_eq!(game_night["sport"], "NBA");

    let detail_uri = format!("/host/game-nights/{}", game_night["id"].as_str().unwrap());
    let (forbidden, _) = send(&app, "GET", &detail_uri, Some(OTHER_TOKEN), None).await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);

    let (status, prompt) = send(
        &app,
        "POST",
        "/host/prompts",
        Some(HOST_TOKEN),
        Some(json!({
            "game_night_id": game_night["id"],
            "kind": "over_under",
            "question": "Total points?",
            "over_under_line": 221.5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(prompt["state"], "draft");
    assert_eq!(prompt["options"][0]["label"], "Over");
    let prompt_id = prompt["id"].as_str().unwrap().to_owned();
    let over = prompt["options"][0]["id"].clone();

    let (bad_window, _) = send(
        &app,
        "POST",
        &format!("/host/prompts/{prompt_id}/open"),
        Some(HOST_TOKEN),
        Some(json!({ "duration_secs": 0 })),
    )
    .await;
    assert_eq!(bad_window, StatusCode::BAD_REQUEST);

    let (status, opened) = send(
        &app,
        "POST",
        &format!("/host/prompts/{prompt_id}/open"),
        Some(HOST_TOKEN),
        Some(json!({ "duration_secs": 60 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened["state"], "open");

    let (status, joined) = send(&app, "POST", "/g/hoops/join", None, Some(json!({ "nickname": "Ada" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let patron_id = joined["patron_id"].clone();

    let (status, receipt) = send(
        &app,
        "POST",
        "/g/HOOPS/submissions",
        None,
        Some(json!({ "patron_id": patron_id, "prompt_id": prompt_id, "option_id": over })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["potential_points"], 10);

    let (again, _) = send(
        &app,
        "POST",
        "/g/HOOPS/submissions",
        None,
        Some(json!({ "patron_id": patron_id, "prompt_id": prompt_id, "option_id": over })),
    )
    .await;
    assert_eq!(again, StatusCode::CONFLICT);

    let (status, resolved) = send(
        &app,
        "POST",
        &format!("/host/prompts/{prompt_id}/resolve"),
        Some(HOST_TOKEN),
        Some(json!({ "correct_option_id": over })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["prompt"]["state"], "resolved");
    assert_eq!(resolved["correct"], 1);

    let uri = format!("/g/hoops/leaderboard?patron_id={}", patron_id.as_str().unwrap());
    let (status, board) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["rows"][0]["nickname"], "Ada");
    assert_eq!(board["me"]["rank"], 1);
    assert!(board["me"]["total_points"].as_u64().unwrap() >= 5);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let app = app().await;
    let (status, _) = send(&app, "POST", "/g/NOPE/join", None, Some(json!({ "nickname": "Ada" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
