use super::*;
use axum::{body, body::Body, http::Request};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> Router {
    build_router(Arc::new(AppState::default()), 64 * 1024)
}

async fn read_body(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

fn encoded(data: &str) -> String {
    url::form_urlencoded::byte_serialize(data.as_bytes()).collect()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"ok");
}

#[tokio::test]
async fn responses_echoes_valid_data() {
    let data = json!([
        {"type": "alert", "message": "hello"},
        {"type": "AutoCompleteJS:update_suggestions", "data": [{"value": "1", "display": "One"}]}
    ])
    .to_string();

    let request = Request::get(format!("/responses?data={}", encoded(&data)))
        .body(Body::empty())
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("type"),
        "application/json"
    );
    let body: Value = serde_json::from_slice(&read_body(response).await).expect("json");
    assert_eq!(body, serde_json::from_str::<Value>(&data).expect("json"));
}

#[tokio::test]
async fn responses_rejects_malformed_data() {
    let request = Request::get(format!(
        "/responses?data={}",
        encoded(r#"[{"type":"alert"}]"#)
    ))
    .body(Body::empty())
    .expect("request");
    let response = test_app().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&read_body(response).await).expect("json");
    assert_eq!(error["code"], "validation");
}

#[tokio::test]
async fn responses_requires_a_parameter() {
    let request = Request::get("/responses")
        .body(Body::empty())
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_accepts_form_posts() {
    let data = r#"[{"type":"reload"}]"#;
    let request = Request::post("/responses")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("data={}", encoded(data))))
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, data.as_bytes());
}

#[tokio::test]
async fn stored_sessions_are_replayed() {
    let app = test_app();
    let envelope = r#"[{"type":"callback","key":"update_content","parameters":["<p>hi</p>"]}]"#;

    let store = Request::put("/sessions/welcome")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(envelope))
        .expect("request");
    let response = app.clone().oneshot(store).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let replay = Request::get("/responses?session_key=welcome")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(replay).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&read_body(response).await).expect("json");
    assert_eq!(body[0]["key"], "update_content");
    assert_eq!(body[0]["parameters"][0], "<p>hi</p>");

    let direct = Request::get("/sessions/welcome")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(direct).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let request = Request::get("/responses?session_key=nope")
        .body(Body::empty())
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_slice(&read_body(response).await).expect("json");
    assert_eq!(error["code"], "not_found");
}

#[tokio::test]
async fn storing_an_invalid_envelope_is_rejected() {
    let request = Request::put("/sessions/bad")
        .body(Body::from(r#"{"type":"alert","message":"not a list"}"#))
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn null_endpoint_returns_json_null() {
    let request = Request::get("/null").body(Body::empty()).expect("request");
    let response = test_app().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, b"null");
}

#[tokio::test]
async fn fixtures_directory_is_loaded_by_file_stem() {
    let dir = std::env::temp_dir().join(format!("response_fixtures_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("dir");
    std::fs::write(dir.join("greeting.json"), r#"[{"type":"alert","message":"hi"}]"#)
        .expect("fixture");
    std::fs::write(dir.join("notes.txt"), "ignored").expect("other file");

    let state = AppState::default();
    let loaded = state.load_fixtures(&dir).await.expect("load");
    assert_eq!(loaded, 1);
    assert_eq!(state.session("greeting").await.map(|e| e.len()), Some(1));

    std::fs::remove_dir_all(dir).expect("cleanup");
}
