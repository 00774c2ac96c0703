use std::{net::SocketAddr, path::Path as FsPath, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::Envelope,
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Default, Deserialize)]
struct ResponsesQuery {
    data: Option<String>,
    session_key: Option<String>,
}

impl ResponsesQuery {
    /// Fields present in `other` take precedence.
    fn merge(self, other: ResponsesQuery) -> Self {
        Self {
            data: other.data.or(self.data),
            session_key: other.session_key.or(self.session_key),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let state = AppState::default();
    if let Some(dir) = &settings.fixtures_dir {
        let loaded = state.load_fixtures(FsPath::new(dir)).await?;
        info!(dir, loaded, "fixtures loaded");
    }

    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/null", get(null_response).post(null_response))
        .route("/responses", get(responses_get).post(responses_post))
        .route("/sessions/:key", put(store_session).get(fetch_session))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn null_response() -> Response {
    json_body("null".to_string())
}

async fn responses_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResponsesQuery>,
) -> ApiResult<Response> {
    respond(&state, query).await
}

async fn responses_post(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResponsesQuery>,
    form: Option<Form<ResponsesQuery>>,
) -> ApiResult<Response> {
    let query = match form {
        Some(Form(form)) => query.merge(form),
        None => query,
    };
    respond(&state, query).await
}

async fn respond(state: &AppState, query: ResponsesQuery) -> ApiResult<Response> {
    if let Some(key) = query.session_key {
        let envelope = state.session(&key).await.ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ApiError::new(
                    ErrorCode::NotFound,
                    format!("no session stored under '{key}'"),
                )),
            )
        })?;
        return Ok(json_body(encode(&envelope)?));
    }

    let Some(data) = query.data else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                "expected a `data` or `session_key` parameter",
            )),
        ));
    };

    Envelope::parse_optional(&data).map_err(|e| {
        warn!(error = %e, "rejecting malformed envelope");
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, e.to_string())),
        )
    })?;
    Ok(json_body(data))
}

async fn store_session(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let raw = std::str::from_utf8(&body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, e.to_string())),
        )
    })?;
    let envelope = Envelope::parse(raw).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, e.to_string())),
        )
    })?;

    state.store(&key, envelope).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_session(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    respond(
        &state,
        ResponsesQuery {
            data: None,
            session_key: Some(key),
        },
    )
    .await
}

fn encode(envelope: &Envelope) -> ApiResult<String> {
    envelope.to_json().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })
}

fn json_body(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
