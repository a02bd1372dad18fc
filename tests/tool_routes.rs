use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`

use tg_agent_bot::test_helpers::{memory_db, test_app};

async fn json_response(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("request should succeed");
    let status = response.status();
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json: Value = serde_json::from_slice(&body).expect("body should be json");
    (status, json)
}

fn call(name: &str, arguments: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/tools/call")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "name": name, "arguments": arguments }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let (app, _) = test_app(memory_db().await);

    let (status, json) = json_response(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "healthy");
}

#[tokio::test]
async fn lists_every_tool() {
    let (app, _) = test_app(memory_db().await);

    let (status, json) = json_response(
        app,
        Request::builder().uri("/tools").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["data"]
        .as_array()
        .expect("tool list")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert!(names.contains(&"create_group"));
    assert!(names.contains(&"send_message_to_user"));
    assert!(names.contains(&"issue_token"));
}

#[tokio::test]
async fn group_tools_round_trip() {
    let (app, _) = test_app(memory_db().await);

    let (status, _) = json_response(
        app.clone(),
        call("create_user", json!({ "telegram_id": 7, "username": "ann" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, created) = json_response(
        app.clone(),
        call("create_group", json!({ "name": "math", "member_ids": [7, 8] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["data"]["members_added"], 1);
    let group_id = created["data"]["id"].as_str().expect("group id").to_string();

    let (status, detail) =
        json_response(app.clone(), call("get_group_by_id", json!({ "group_id": group_id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["data"]["name"], "math");
    assert_eq!(detail["data"]["members"][0]["telegram_id"], 7);

    let (status, _) = json_response(
        app.clone(),
        call("remove_user_from_group", json!({ "group_id": group_id, "telegram_id": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = json_response(
        app,
        call("remove_user_from_group", json!({ "group_id": group_id, "telegram_id": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "membership not found");
}

#[tokio::test]
async fn duplicate_group_is_a_conflict() {
    let (app, _) = test_app(memory_db().await);
    json_response(app.clone(), call("create_group", json!({ "name": "math" }))).await;

    let (status, json) =
        json_response(app, call("create_group", json!({ "name": "math" }))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let (app, _) = test_app(memory_db().await);

    let (status, json) =
        json_response(app, call("get_user_by_telegram_id", json!({ "telegram_id": 5 }))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "member 5 not found");
}

#[tokio::test]
async fn bad_arguments_and_unknown_tools_are_rejected() {
    let (app, _) = test_app(memory_db().await);

    let (status, json) =
        json_response(app.clone(), call("delete_group", json!({ "group_id": "nope" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().expect("message").contains("delete_group"));

    let (status, json) = json_response(app, call("launch_rockets", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "unknown tool 'launch_rockets'");
}

#[tokio::test]
async fn malformed_body_is_wrapped_in_the_envelope() {
    let (app, _) = test_app(memory_db().await);

    let (status, json) = json_response(
        app,
        Request::builder()
            .method("POST")
            .uri("/tools/call")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;

    assert!(status.is_client_error());
    assert_eq!(json["status"], status.as_u16());
    assert!(json["data"].is_null());
}

#[tokio::test]
async fn send_message_goes_through_the_messenger() {
    let (app, messenger) = test_app(memory_db().await);

    let (status, _) = json_response(
        app.clone(),
        call("send_message_to_user", json!({ "chat_id": 42, "message": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messenger.sent(), vec![(42, "hello".to_string())]);

    let (status, _) = json_response(
        app,
        call("send_message_to_user", json!({ "chat_id": 42, "message": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn issued_tokens_can_be_revoked_by_their_owner_only() {
    let (app, _) = test_app(memory_db().await);

    let (status, issued) = json_response(
        app.clone(),
        call("issue_token", json!({ "token_id": "invite-1", "actions": ["agent:chat"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issued["data"]["id"], "invite-1");
    assert_eq!(issued["data"]["actions"], json!(["agent:chat"]));

    let (status, _) = json_response(
        app.clone(),
        call("revoke_token", json!({ "token_id": "invite-1", "owner": "someone" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        json_response(app.clone(), call("revoke_token", json!({ "token_id": "invite-1" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
        json_response(app, call("revoke_token", json!({ "token_id": "invite-1" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
