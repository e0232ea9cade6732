//! HTTP surface: launch, mapping and affordance endpoints over one store.
//!
//! Handlers do their store work synchronously; the store serializes access
//! behind its own lock.

use anyhow::Context;
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lti_bridge_core::{
    render_link_affordances, BridgeConfig, BridgeError, BridgeResult, LaunchContext,
    LaunchDispatcher, LaunchMode, MappingOutcome, MappingRequest, PageView, RequestSession,
    SessionChange, SqliteStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const SESSION_COOKIE: &str = "lti_bridge_session";
pub const MAPPING_ENDPOINT: &str = "/api/ltimap";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<LaunchDispatcher<SqliteStore>>,
    pub config: Arc<BridgeConfig>,
}

impl AppState {
    pub fn new(dispatcher: LaunchDispatcher<SqliteStore>, config: BridgeConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(config),
        }
    }

    fn store(&self) -> &SqliteStore {
        self.dispatcher.store()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/lti", post(launch))
        .route("/api/lti/:blog", post(launch_for_collection))
        .route(MAPPING_ENDPOINT, get(mapping))
        .route("/api/ltimap/links", get(link_affordances))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(state: AppState, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(event = "server_listening", addr = %listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("http server failed")?;
    tracing::info!(event = "server_stopped");
    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": lti_bridge_core::VERSION,
    }))
}

async fn launch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Form(body): Form<HashMap<String, String>>,
) -> Response {
    launch_impl(&state, &headers, merge_params(query, body))
}

async fn launch_for_collection(
    State(state): State<AppState>,
    Path(blog): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Form(body): Form<HashMap<String, String>>,
) -> Response {
    let mut params = merge_params(query, body);
    params.insert("blog".to_string(), blog);
    launch_impl(&state, &headers, params)
}

/// Launch URLs carry deep-link keys in the query; body keys win on overlap.
pub(crate) fn merge_params(
    mut query: HashMap<String, String>,
    body: HashMap<String, String>,
) -> HashMap<String, String> {
    query.extend(body);
    query
}

fn launch_impl(state: &AppState, headers: &HeaderMap, params: HashMap<String, String>) -> Response {
    if !upstream_verified(&state.config, headers) {
        return (StatusCode::UNAUTHORIZED, "launch not validated upstream\n").into_response();
    }

    let ctx = LaunchContext::from_params(&params, &state.config.login_param);
    let (token, mut session) = load_session(state.store(), headers);
    let report = state.dispatcher.handle_launch(&ctx, &mut session);

    let mut response = redirect(&report.redirect.location);
    match persist_session(state.store(), token.as_deref(), session.change()) {
        Ok(Some(cookie)) => match cookie_header(&cookie, state.config.cookie_secure) {
            Some(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            None => tracing::warn!(event = "session_cookie_invalid"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(event = "session_persist_failed", error = %e),
    }
    response
}

async fn mapping(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let referrer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let req = MappingRequest::from_params(&params, referrer);
    let (_, session) = load_session(state.store(), &headers);

    match state.dispatcher.handle_mapping_request(&req, &session) {
        MappingOutcome::Redirect(r) => redirect(&r.location),
        MappingOutcome::Halt(e) => error_response(&e),
    }
}

async fn link_affordances(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let page = PageView {
        target: params.get("target").cloned().unwrap_or_default(),
        collection: params
            .get("blog")
            .and_then(|b| lti_bridge_core::CollectionId::parse_param(b)),
        content_only: params.contains_key("content_only"),
        deep_link: params.contains_key("page_title"),
    };
    let (_, session) = load_session(state.store(), &headers);

    match render_link_affordances(
        state.dispatcher.mapper(),
        &session,
        &page,
        MAPPING_ENDPOINT,
        state.dispatcher.primary_collection(),
    ) {
        Ok(html) => Html(html).into_response(),
        Err(e) => error_response(&e),
    }
}

fn upstream_verified(config: &BridgeConfig, headers: &HeaderMap) -> bool {
    let presented = headers
        .get(config.launch.upstream_header.as_str())
        .and_then(|v| v.to_str().ok());
    let verified = match (&config.launch.upstream_token, presented) {
        (Some(expected), Some(got)) => expected == got,
        _ => false,
    };
    if verified {
        return true;
    }
    match config.launch.mode {
        LaunchMode::Strict => {
            tracing::warn!(event = "launch_rejected", reason = "upstream token missing or wrong");
            false
        }
        LaunchMode::Permissive => {
            tracing::warn!(event = "launch_unverified", "accepting launch without upstream token");
            true
        }
    }
}

/// Session cookie value from the request, if any.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn load_session(store: &SqliteStore, headers: &HeaderMap) -> (Option<String>, RequestSession) {
    let Some(token) = session_token(headers) else {
        return (None, RequestSession::anonymous());
    };
    match store.session_account(&token) {
        Ok(Some(account)) => (Some(token), RequestSession::for_account(account)),
        Ok(None) => (Some(token), RequestSession::anonymous()),
        Err(e) => {
            tracing::warn!(event = "session_lookup_failed", error = %e);
            (Some(token), RequestSession::anonymous())
        }
    }
}

/// New cookie value to send: `Some("")` clears the cookie.
fn persist_session(
    store: &SqliteStore,
    old_token: Option<&str>,
    change: SessionChange,
) -> BridgeResult<Option<String>> {
    match change {
        SessionChange::Unchanged => Ok(None),
        SessionChange::Started(account) => {
            if let Some(old) = old_token {
                store.revoke_session(old)?;
            }
            let token = store.create_session(account)?;
            tracing::debug!(event = "session_started", account = %account);
            Ok(Some(token))
        }
        SessionChange::Ended => {
            if let Some(old) = old_token {
                store.revoke_session(old)?;
            }
            Ok(Some(String::new()))
        }
    }
}

fn cookie_header(token: &str, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=None");
    if token.is_empty() {
        cookie.push_str("; Max-Age=0");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::warn!(event = "redirect_invalid", location);
            (StatusCode::INTERNAL_SERVER_ERROR, "invalid redirect location\n").into_response()
        }
    }
}

fn error_response(err: &BridgeError) -> Response {
    let status = match err {
        BridgeError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        BridgeError::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(event = "request_halted", status = status.as_u16(), error = %err);
    (status, format!("{err}\n")).into_response()
}
