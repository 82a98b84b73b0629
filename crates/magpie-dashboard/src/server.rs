//! Dashboard HTTP transport: shared state, router, the JSON control
//! API, the live SSE event stream, and the signed interactions webhook.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::body::Bytes;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use ed25519_dalek::{Signature, VerifyingKey};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_stream::wrappers::UnboundedReceiverStream;

use magpie_commands::{CommandError, CommandStore};
use magpie_core::current_unix_timestamp_ms;
use magpie_events::{Event, EventKind, EventQuery, EventRecorder};
use magpie_gateway::{
    create_command, delete_command, format_user_tag, CommandInvocation, DiscordRestClient,
    GatewayStatus, InvocationOption, MessagePipeline, SlashOptionSpec, SlashScope,
};

use crate::auth::{
    authorize_dashboard_request, authorize_with_credential, bearer_token_from_headers,
    collect_auth_status_report, enforce_rate_limit, issue_session_token, AuthRuntimeState,
    DashboardAuthMode,
};
use crate::page::render_dashboard_page;
use crate::types::{
    AuthSessionRequest, CustomAddRequest, CustomRemoveRequest, DashboardApiError,
    SendMessageRequest, SlashCreateRequest, SlashDeleteRequest,
};

pub(crate) const DASHBOARD_PAGE_ENDPOINT: &str = "/";
pub(crate) const API_AUTH_SESSION_ENDPOINT: &str = "/api/auth/session";
pub(crate) const API_STATUS_ENDPOINT: &str = "/api/status";
pub(crate) const API_GUILDS_ENDPOINT: &str = "/api/guilds";
pub(crate) const API_CHANNELS_ENDPOINT: &str = "/api/channels";
pub(crate) const API_SEND_ENDPOINT: &str = "/api/send";
pub(crate) const API_CUSTOM_LIST_ENDPOINT: &str = "/api/custom/list";
pub(crate) const API_CUSTOM_ADD_ENDPOINT: &str = "/api/custom/add";
pub(crate) const API_CUSTOM_REMOVE_ENDPOINT: &str = "/api/custom/remove";
pub(crate) const API_SLASH_LIST_ENDPOINT: &str = "/api/slash/list";
pub(crate) const API_SLASH_CREATE_ENDPOINT: &str = "/api/slash/create";
pub(crate) const API_SLASH_DELETE_ENDPOINT: &str = "/api/slash/delete";
pub(crate) const API_EVENTS_ENDPOINT: &str = "/api/events";
pub(crate) const API_EVENT_DAYS_ENDPOINT: &str = "/api/events/days";
pub(crate) const API_EVENT_DAY_DETAIL_ENDPOINT: &str = "/api/events/days/{date}";
pub(crate) const API_LOG_STREAM_ENDPOINT: &str = "/api/logs/stream";
pub(crate) const API_INTERACTIONS_ENDPOINT: &str = "/api/interactions";

const SSE_KEEP_ALIVE_SECONDS: u64 = 15;

const INTERACTION_SIGNATURE_HEADER: &str = "x-signature-ed25519";
const INTERACTION_TIMESTAMP_HEADER: &str = "x-signature-timestamp";
const INTERACTION_TYPE_PING: u64 = 1;
const INTERACTION_TYPE_APPLICATION_COMMAND: u64 = 2;
const INTERACTION_CALLBACK_PONG: u64 = 1;
const INTERACTION_CALLBACK_MESSAGE: u64 = 4;
/// Message flag marking an interaction reply visible only to the
/// invoking user.
const EPHEMERAL_MESSAGE_FLAG: u64 = 64;

/// Public struct `DashboardConfig` used across Magpie components.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub bind: String,
    pub auth_mode: DashboardAuthMode,
    pub auth_token: Option<String>,
    pub auth_password: Option<String>,
    pub session_ttl_seconds: u64,
    pub rate_limit_window_seconds: u64,
    pub rate_limit_max_requests: usize,
    pub interactions_public_key: Option<String>,
}

/// Shared state behind every dashboard handler.
pub struct DashboardState {
    pub(crate) config: DashboardConfig,
    pub(crate) store: Arc<Mutex<CommandStore>>,
    pub(crate) recorder: Arc<Mutex<EventRecorder>>,
    pub(crate) gateway_status: Arc<Mutex<GatewayStatus>>,
    pub(crate) rest: Arc<DiscordRestClient>,
    pub(crate) pipeline: Arc<MessagePipeline>,
    pub(crate) auth_runtime: std::sync::Mutex<AuthRuntimeState>,
    pub(crate) session_sequence: AtomicU64,
    pub(crate) started_unix_ms: u64,
}

impl DashboardState {
    pub fn new(
        config: DashboardConfig,
        store: Arc<Mutex<CommandStore>>,
        recorder: Arc<Mutex<EventRecorder>>,
        gateway_status: Arc<Mutex<GatewayStatus>>,
        rest: Arc<DiscordRestClient>,
        pipeline: Arc<MessagePipeline>,
    ) -> Self {
        Self {
            config,
            store,
            recorder,
            gateway_status,
            rest,
            pipeline,
            auth_runtime: std::sync::Mutex::new(AuthRuntimeState::default()),
            session_sequence: AtomicU64::new(0),
            started_unix_ms: current_unix_timestamp_ms(),
        }
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.session_sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Binds the configured address and serves the dashboard until ctrl-c.
pub async fn run_dashboard_server(state: Arc<DashboardState>) -> Result<()> {
    let bind_addr = state
        .config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", state.config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind dashboard server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound dashboard address")?;

    println!(
        "magpie dashboard listening: addr={} auth_mode={}",
        local_addr,
        state.config.auth_mode.as_str()
    );

    let app = build_dashboard_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("dashboard server exited unexpectedly")
}

/// Full dashboard route table over the shared state.
pub fn build_dashboard_router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route(DASHBOARD_PAGE_ENDPOINT, get(handle_dashboard_page))
        .route(API_AUTH_SESSION_ENDPOINT, post(handle_auth_session))
        .route(API_STATUS_ENDPOINT, get(handle_status))
        .route(API_GUILDS_ENDPOINT, get(handle_guilds))
        .route(API_CHANNELS_ENDPOINT, get(handle_channels))
        .route(API_SEND_ENDPOINT, post(handle_send))
        .route(API_CUSTOM_LIST_ENDPOINT, get(handle_custom_list))
        .route(API_CUSTOM_ADD_ENDPOINT, post(handle_custom_add))
        .route(API_CUSTOM_REMOVE_ENDPOINT, delete(handle_custom_remove))
        .route(API_SLASH_LIST_ENDPOINT, get(handle_slash_list))
        .route(API_SLASH_CREATE_ENDPOINT, post(handle_slash_create))
        .route(API_SLASH_DELETE_ENDPOINT, delete(handle_slash_delete))
        .route(API_EVENTS_ENDPOINT, get(handle_events))
        .route(API_EVENT_DAYS_ENDPOINT, get(handle_event_days))
        .route(API_EVENT_DAY_DETAIL_ENDPOINT, get(handle_event_day_detail))
        .route(API_LOG_STREAM_ENDPOINT, get(handle_log_stream))
        .route(API_INTERACTIONS_ENDPOINT, post(handle_interactions))
        .with_state(state)
}

/// Authorization then the per-principal rate limit; the order every
/// credentialed endpoint applies.
fn gate_api_request(
    state: &DashboardState,
    headers: &HeaderMap,
) -> Result<String, DashboardApiError> {
    let principal = authorize_dashboard_request(state, headers)?;
    enforce_rate_limit(state, &principal)?;
    Ok(principal)
}

fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, DashboardApiError> {
    serde_json::from_slice(body).map_err(|error| {
        DashboardApiError::bad_request(
            "malformed_json",
            format!("failed to parse request body: {error}"),
        )
    })
}

fn command_store_error(error: CommandError) -> DashboardApiError {
    match &error {
        CommandError::InvalidName(_) => {
            DashboardApiError::bad_request("invalid_name", error.to_string())
        }
        CommandError::MissingGuildId => {
            DashboardApiError::bad_request("missing_guild_id", error.to_string())
        }
        CommandError::NotFound { .. } => {
            DashboardApiError::not_found("unknown_command", error.to_string())
        }
        CommandError::Persistence(_) => DashboardApiError::internal(error.to_string()),
    }
}

fn parse_slash_scope(scope: &str, guild_id: &str) -> Result<SlashScope, DashboardApiError> {
    let guild_id = guild_id.trim();
    match scope.trim().to_lowercase().as_str() {
        "" | "global" => Ok(SlashScope::Global),
        "guild" => {
            if guild_id.is_empty() {
                return Err(DashboardApiError::bad_request(
                    "missing_guild_id",
                    "guild scope requires guild_id",
                ));
            }
            Ok(SlashScope::Guild(guild_id.to_string()))
        }
        other => Err(DashboardApiError::bad_request(
            "invalid_scope",
            format!("unknown slash scope '{other}': use global or guild"),
        )),
    }
}

async fn handle_dashboard_page() -> Html<String> {
    Html(render_dashboard_page())
}

async fn handle_auth_session(
    State(state): State<Arc<DashboardState>>,
    body: Bytes,
) -> Response {
    if state.config.auth_mode != DashboardAuthMode::PasswordSession {
        return DashboardApiError::bad_request(
            "auth_mode_mismatch",
            "session issuance requires --auth-mode=password-session",
        )
        .into_response();
    }
    if let Err(error) = enforce_rate_limit(&state, "auth_session_issue") {
        return error.into_response();
    }
    let request: AuthSessionRequest = match parse_json_body(&body) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    match issue_session_token(&state, request.password.as_str()) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error.into_response(),
    }
}

async fn handle_status(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let connector = { state.gateway_status.lock().await.clone() };
    let stats = { state.recorder.lock().await.stats() };
    let auth = collect_auth_status_report(&state);
    (
        StatusCode::OK,
        Json(json!({
            "online": connector.online,
            "user_tag": connector.user_tag,
            "guild_count": connector.guild_count,
            "uptime_ms": current_unix_timestamp_ms().saturating_sub(state.started_unix_ms),
            "last_cycle_unix_ms": connector.last_cycle_unix_ms,
            "messages_ingested": connector.messages_ingested,
            "bot_messages_skipped": connector.bot_messages_skipped,
            "replies_sent": connector.replies_sent,
            "transport_failures": connector.transport_failures,
            "events_recorded": stats.events_recorded,
            "append_failures": stats.append_failures,
            "active_subscribers": stats.active_subscribers,
            "auth": auth,
        })),
    )
        .into_response()
}

async fn handle_guilds(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    match state.rest.list_guilds().await {
        Ok(guilds) => (StatusCode::OK, Json(json!({ "guilds": guilds }))).into_response(),
        Err(error) => DashboardApiError::from(error).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct GuildScopedQuery {
    #[serde(default)]
    guild_id: String,
}

async fn handle_channels(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Query(query): Query<GuildScopedQuery>,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let guild_id = query.guild_id.trim();
    if guild_id.is_empty() {
        return DashboardApiError::bad_request(
            "missing_guild_id",
            "guild_id query parameter is required",
        )
        .into_response();
    }
    match state.rest.list_text_channels(guild_id).await {
        Ok(channels) => (StatusCode::OK, Json(json!({ "channels": channels }))).into_response(),
        Err(error) => DashboardApiError::from(error).into_response(),
    }
}

async fn handle_send(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let request: SendMessageRequest = match parse_json_body(&body) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    let channel_id = request.channel_id.trim();
    if channel_id.is_empty() {
        return DashboardApiError::bad_request("missing_field", "channel_id is required")
            .into_response();
    }
    if request.message.trim().is_empty() {
        return DashboardApiError::bad_request("missing_field", "message is required")
            .into_response();
    }
    match state.rest.send_message(channel_id, &request.message).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(error) => DashboardApiError::from(error).into_response(),
    }
}

async fn handle_custom_list(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Query(query): Query<GuildScopedQuery>,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let guild_id = query.guild_id.trim();
    if guild_id.is_empty() {
        return DashboardApiError::bad_request(
            "missing_guild_id",
            "guild_id query parameter is required",
        )
        .into_response();
    }
    let entries = { state.store.lock().await.list(guild_id) };
    let commands: Vec<Value> = entries
        .into_iter()
        .map(|(name, response)| json!({ "name": name, "response": response }))
        .collect();
    (
        StatusCode::OK,
        Json(json!({ "guild_id": guild_id, "commands": commands })),
    )
        .into_response()
}

async fn handle_custom_add(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let request: CustomAddRequest = match parse_json_body(&body) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    let outcome = {
        let mut store = state.store.lock().await;
        store.add(&request.guild_id, &request.name, &request.response)
    };
    match outcome {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(error) => command_store_error(error).into_response(),
    }
}

async fn handle_custom_remove(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let request: CustomRemoveRequest = match parse_json_body(&body) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    let outcome = {
        let mut store = state.store.lock().await;
        store.remove(&request.guild_id, &request.name)
    };
    match outcome {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(error) => command_store_error(error).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct SlashListQuery {
    #[serde(default)]
    scope: String,
    #[serde(default)]
    guild_id: String,
}

async fn handle_slash_list(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Query(query): Query<SlashListQuery>,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let scope = match parse_slash_scope(&query.scope, &query.guild_id) {
        Ok(scope) => scope,
        Err(error) => return error.into_response(),
    };
    match state.rest.list_commands(&scope).await {
        Ok(commands) => (StatusCode::OK, Json(json!({ "commands": commands }))).into_response(),
        Err(error) => DashboardApiError::from(error).into_response(),
    }
}

async fn handle_slash_create(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let request: SlashCreateRequest = match parse_json_body(&body) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    let scope = match parse_slash_scope(&request.scope, &request.guild_id) {
        Ok(scope) => scope,
        Err(error) => return error.into_response(),
    };
    let options: Vec<SlashOptionSpec> = request
        .options
        .iter()
        .map(|option| SlashOptionSpec {
            name: option.name.clone(),
            description: option.description.clone(),
            required: option.required,
        })
        .collect();
    match create_command(
        &state.rest,
        &scope,
        &request.name,
        &request.description,
        &options,
    )
    .await
    {
        Ok(name) => (StatusCode::OK, Json(json!({ "ok": true, "name": name }))).into_response(),
        Err(error) => DashboardApiError::from(error).into_response(),
    }
}

async fn handle_slash_delete(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let request: SlashDeleteRequest = match parse_json_body(&body) {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };
    let scope = match parse_slash_scope(&request.scope, &request.guild_id) {
        Ok(scope) => scope,
        Err(error) => return error.into_response(),
    };
    match delete_command(&state.rest, &scope, &request.command_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(error) => DashboardApiError::from(error).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct EventListQuery {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn handle_events(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Query(query): Query<EventListQuery>,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let kind = match query
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(raw) => match EventKind::parse(raw) {
            Some(kind) => Some(kind),
            None => {
                return DashboardApiError::bad_request(
                    "invalid_kind",
                    format!("unknown event kind '{raw}'"),
                )
                .into_response();
            }
        },
        None => None,
    };
    let recorder_query = EventQuery {
        kind,
        guild_id: query
            .guild_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        user_id: query
            .user_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        limit: query.limit,
    };
    let events = { state.recorder.lock().await.query(&recorder_query) };
    (StatusCode::OK, Json(json!({ "events": events }))).into_response()
}

async fn handle_event_days(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let days = match state.recorder.lock().await.list_days() {
        Ok(days) => days,
        Err(error) => {
            tracing::warn!("event day listing failed: {error:#}");
            return DashboardApiError::internal("failed to list event log days").into_response();
        }
    };
    (StatusCode::OK, Json(json!({ "days": days }))).into_response()
}

async fn handle_event_day_detail(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    AxumPath(date): AxumPath<String>,
) -> Response {
    if let Err(error) = gate_api_request(&state, &headers) {
        return error.into_response();
    }
    let date = date.trim().to_string();
    let lines = match state.recorder.lock().await.read_day(&date) {
        Ok(lines) => lines,
        Err(error) => {
            tracing::warn!("event day read failed: {error:#}");
            return DashboardApiError::internal("failed to read the event log").into_response();
        }
    };
    match lines {
        Some(lines) => (
            StatusCode::OK,
            Json(json!({ "date": date, "lines": lines })),
        )
            .into_response(),
        None => DashboardApiError::not_found("unknown_day", format!("no event log for '{date}'"))
            .into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct StreamQuery {
    #[serde(default)]
    access_token: Option<String>,
}

/// Live SSE stream of recorder events. The credential may arrive as a
/// bearer header or an `access_token` query parameter because
/// `EventSource` cannot set headers.
async fn handle_log_stream(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Response {
    let credential = bearer_token_from_headers(&headers).or_else(|| {
        query
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    });
    let principal = match authorize_with_credential(&state, credential) {
        Ok(principal) => principal,
        Err(error) => return error.into_response(),
    };
    if let Err(error) = enforce_rate_limit(&state, &principal) {
        return error.into_response();
    }
    // The receiver's drop is the unsubscribe: the recorder prunes the
    // dead sender at its next fan-out.
    let (_subscriber_id, receiver) = { state.recorder.lock().await.subscribe() };
    let stream = UnboundedReceiverStream::new(receiver)
        .map(|event| Ok::<SseEvent, Infallible>(event_stream_frame(&event)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECONDS))
                .text("keepalive"),
        )
        .into_response()
}

fn event_stream_frame(event: &Event) -> SseEvent {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().event(event.kind.as_str()).data(payload)
}

/// Interactions webhook. Authenticated by the request signature rather
/// than a dashboard credential: the platform signs `timestamp || body`
/// with the application's ed25519 key.
async fn handle_interactions(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(public_key_hex) = state
        .config
        .interactions_public_key
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return DashboardApiError::internal("interactions public key is not configured")
            .into_response();
    };
    let verifying_key = match interactions_verifying_key(public_key_hex) {
        Ok(key) => key,
        Err(error) => {
            return DashboardApiError::internal(format!(
                "interactions public key is invalid: {error:#}"
            ))
            .into_response();
        }
    };
    if let Err(error) = verify_interaction_signature(&verifying_key, &headers, &body) {
        return error.into_response();
    }

    let payload: Value = match parse_json_body(&body) {
        Ok(payload) => payload,
        Err(error) => return error.into_response(),
    };
    match payload.get("type").and_then(Value::as_u64) {
        Some(INTERACTION_TYPE_PING) => (
            StatusCode::OK,
            Json(json!({ "type": INTERACTION_CALLBACK_PONG })),
        )
            .into_response(),
        Some(INTERACTION_TYPE_APPLICATION_COMMAND) => {
            let invocation = parse_interaction_invocation(&payload);
            let reply = state.pipeline.handle_invocation(&invocation).await;
            let mut data = json!({ "content": reply.content });
            if reply.ephemeral {
                data["flags"] = json!(EPHEMERAL_MESSAGE_FLAG);
            }
            (
                StatusCode::OK,
                Json(json!({ "type": INTERACTION_CALLBACK_MESSAGE, "data": data })),
            )
                .into_response()
        }
        _ => DashboardApiError::bad_request(
            "unsupported_interaction_type",
            "only ping and application command interactions are supported",
        )
        .into_response(),
    }
}

fn invalid_signature_error() -> DashboardApiError {
    DashboardApiError::new(
        StatusCode::UNAUTHORIZED,
        "invalid_signature",
        "interaction signature verification failed",
    )
}

fn signature_header(headers: &HeaderMap, name: &str) -> Result<String, DashboardApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DashboardApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                format!("missing {name} header"),
            )
        })
}

fn verify_interaction_signature(
    verifying_key: &VerifyingKey,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<(), DashboardApiError> {
    let signature_hex = signature_header(headers, INTERACTION_SIGNATURE_HEADER)?;
    let timestamp = signature_header(headers, INTERACTION_TIMESTAMP_HEADER)?;
    let signature_bytes = decode_hex_fixed::<64>("interaction signature", &signature_hex)
        .map_err(|_| invalid_signature_error())?;
    let signature = Signature::from_bytes(&signature_bytes);
    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);
    verifying_key
        .verify_strict(&message, &signature)
        .map_err(|_| invalid_signature_error())
}

fn interactions_verifying_key(public_key_hex: &str) -> Result<VerifyingKey> {
    let bytes = decode_hex_fixed::<32>("interactions public key", public_key_hex)?;
    VerifyingKey::from_bytes(&bytes).context("failed to decode ed25519 public key bytes")
}

fn decode_hex_fixed<const N: usize>(label: &str, raw: &str) -> Result<[u8; N]> {
    let trimmed = raw.trim();
    if trimmed.len() != N * 2 {
        bail!(
            "{} must be {} hex characters, got {}",
            label,
            N * 2,
            trimmed.len()
        );
    }
    let raw_bytes = trimmed.as_bytes();
    let mut bytes = [0u8; N];
    for (index, byte) in bytes.iter_mut().enumerate() {
        let offset = index * 2;
        let chunk = std::str::from_utf8(&raw_bytes[offset..offset + 2])
            .with_context(|| format!("invalid utf-8 in {label}"))?;
        *byte = u8::from_str_radix(chunk, 16)
            .with_context(|| format!("invalid hex byte '{chunk}' in {label}"))?;
    }
    Ok(bytes)
}

fn string_field(source: Option<&Value>, key: &str) -> String {
    source
        .and_then(|value| value.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_interaction_invocation(payload: &Value) -> CommandInvocation {
    let data = payload.get("data");
    let user = payload
        .get("member")
        .and_then(|member| member.get("user"))
        .or_else(|| payload.get("user"));
    let options = data
        .and_then(|data| data.get("options"))
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name").and_then(Value::as_str)?.to_string();
                    let value = match entry.get("value") {
                        Some(Value::String(text)) => text.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    };
                    Some(InvocationOption { name, value })
                })
                .collect()
        })
        .unwrap_or_default();
    CommandInvocation {
        guild_id: payload
            .get("guild_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|value| !value.is_empty()),
        guild_name: String::new(),
        channel_id: string_field(Some(payload), "channel_id"),
        user_id: string_field(user, "id"),
        user_tag: format_user_tag(
            &string_field(user, "username"),
            &string_field(user, "discriminator"),
        ),
        command_name: string_field(data, "name"),
        options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use httpmock::prelude::*;
    use reqwest::Client;
    use std::path::Path;
    use tempfile::tempdir;

    fn test_config(auth_mode: DashboardAuthMode) -> DashboardConfig {
        DashboardConfig {
            bind: "127.0.0.1:0".to_string(),
            auth_mode,
            auth_token: Some("secret-token".to_string()),
            auth_password: Some("pw-secret".to_string()),
            session_ttl_seconds: 3600,
            rate_limit_window_seconds: 60,
            rate_limit_max_requests: 120,
            interactions_public_key: None,
        }
    }

    fn test_state(root: &Path, api_base: &str, config: DashboardConfig) -> Arc<DashboardState> {
        let store = Arc::new(Mutex::new(
            CommandStore::load(&root.join("custom-commands.json")).expect("load store"),
        ));
        let recorder = Arc::new(Mutex::new(
            EventRecorder::new(&root.join("logs")).expect("create recorder"),
        ));
        let rest = Arc::new(DiscordRestClient::new(
            api_base,
            "test-token",
            Some("app-1"),
            1,
            0,
        ));
        let pipeline = Arc::new(MessagePipeline::new(
            Arc::clone(&store),
            Arc::clone(&recorder),
            Arc::clone(&rest),
        ));
        let gateway_status = Arc::new(Mutex::new(GatewayStatus::default()));
        Arc::new(DashboardState::new(
            config,
            store,
            recorder,
            gateway_status,
            rest,
            pipeline,
        ))
    }

    async fn spawn_test_server(
        state: Arc<DashboardState>,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("resolve listener addr");
        let app = build_dashboard_router(state);
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        (addr, handle)
    }

    fn encode_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    fn sign_interaction(signing_key: &SigningKey, timestamp: &str, body: &str) -> String {
        let mut message = Vec::new();
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body.as_bytes());
        encode_hex(&signing_key.sign(&message).to_bytes())
    }

    #[test]
    fn unit_decode_hex_fixed_enforces_length_and_charset() {
        let decoded = decode_hex_fixed::<4>("digest", "00ff10Ab").expect("decode");
        assert_eq!(decoded, [0x00, 0xff, 0x10, 0xab]);
        assert!(decode_hex_fixed::<2>("digest", " beef ").is_ok());
        assert!(decode_hex_fixed::<4>("digest", "00ff10").is_err());
        assert!(decode_hex_fixed::<4>("digest", "00ff10zz").is_err());
    }

    #[test]
    fn unit_parse_slash_scope_maps_query_inputs() {
        assert_eq!(parse_slash_scope("", "").expect("global"), SlashScope::Global);
        assert_eq!(
            parse_slash_scope("Global", "ignored").expect("global"),
            SlashScope::Global
        );
        assert_eq!(
            parse_slash_scope("guild", " g-1 ").expect("guild"),
            SlashScope::Guild("g-1".to_string())
        );
        let missing = parse_slash_scope("guild", " ").expect_err("guild scope needs an id");
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        let unknown = parse_slash_scope("cosmic", "").expect_err("unknown scope");
        assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unit_parse_interaction_invocation_flattens_wire_payload() {
        let payload = json!({
            "type": 2,
            "guild_id": "g-1",
            "channel_id": "c-9",
            "member": {"user": {"id": "u-7", "username": "ada", "discriminator": "0"}},
            "data": {"name": "add", "options": [
                {"name": "name", "value": "greet"},
                {"name": "count", "value": 3}
            ]}
        });
        let invocation = parse_interaction_invocation(&payload);
        assert_eq!(invocation.guild_id.as_deref(), Some("g-1"));
        assert_eq!(invocation.channel_id, "c-9");
        assert_eq!(invocation.user_id, "u-7");
        assert_eq!(invocation.user_tag, "ada");
        assert_eq!(invocation.command_name, "add");
        assert_eq!(invocation.option("name"), Some("greet"));
        assert_eq!(invocation.option("count"), Some("3"));

        let bare = parse_interaction_invocation(&json!({"type": 2}));
        assert_eq!(bare.guild_id, None);
        assert_eq!(bare.command_name, "");
        assert!(bare.options.is_empty());
    }

    #[tokio::test]
    async fn functional_dashboard_page_serves_embedded_shell() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::LocalhostDev),
        );
        let (addr, handle) = spawn_test_server(state).await;

        let response = Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .expect("request dashboard page");
        assert_eq!(response.status(), StatusCode::OK);
        let page = response.text().await.expect("read page body");
        assert!(page.contains("Magpie Dashboard"));
        assert!(page.contains(API_LOG_STREAM_ENDPOINT));
        assert!(page.contains(API_CUSTOM_ADD_ENDPOINT));

        handle.abort();
    }

    #[tokio::test]
    async fn functional_status_endpoint_enforces_token_auth() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::Token),
        );
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        let denied = client
            .get(format!("http://{addr}{API_STATUS_ENDPOINT}"))
            .send()
            .await
            .expect("send unauthenticated status request");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        let denied_payload = denied.json::<Value>().await.expect("parse error envelope");
        assert_eq!(denied_payload["error"]["code"], "unauthorized");

        let wrong = client
            .get(format!("http://{addr}{API_STATUS_ENDPOINT}"))
            .bearer_auth("not-the-token")
            .send()
            .await
            .expect("send wrong-token status request");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let accepted = client
            .get(format!("http://{addr}{API_STATUS_ENDPOINT}"))
            .bearer_auth("secret-token")
            .send()
            .await
            .expect("send status request");
        assert_eq!(accepted.status(), StatusCode::OK);
        let payload = accepted.json::<Value>().await.expect("parse status payload");
        assert_eq!(payload["online"], false);
        assert_eq!(payload["events_recorded"], 0);
        assert_eq!(payload["auth"]["mode"], "token");
        assert!(payload["uptime_ms"].is_u64());

        handle.abort();
    }

    #[tokio::test]
    async fn functional_auth_session_flow_issues_and_accepts_tokens() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::PasswordSession),
        );
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        let rejected = client
            .post(format!("http://{addr}{API_AUTH_SESSION_ENDPOINT}"))
            .json(&json!({"password": "wrong"}))
            .send()
            .await
            .expect("send wrong-password request");
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
        let rejected_payload = rejected.json::<Value>().await.expect("parse error envelope");
        assert_eq!(rejected_payload["error"]["code"], "invalid_credentials");

        let malformed = client
            .post(format!("http://{addr}{API_AUTH_SESSION_ENDPOINT}"))
            .header("content-type", "application/json")
            .body("{")
            .send()
            .await
            .expect("send malformed request");
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let issued = client
            .post(format!("http://{addr}{API_AUTH_SESSION_ENDPOINT}"))
            .json(&json!({"password": "pw-secret"}))
            .send()
            .await
            .expect("send session issue request");
        assert_eq!(issued.status(), StatusCode::OK);
        let issued_payload = issued.json::<Value>().await.expect("parse session payload");
        let session_token = issued_payload["access_token"]
            .as_str()
            .expect("access token present")
            .to_string();
        assert!(session_token.starts_with("mag_sess_"));
        assert_eq!(issued_payload["token_type"], "bearer");
        assert_eq!(issued_payload["expires_in_seconds"], 3600);

        let status = client
            .get(format!("http://{addr}{API_STATUS_ENDPOINT}"))
            .bearer_auth(&session_token)
            .send()
            .await
            .expect("send status request with session");
        assert_eq!(status.status(), StatusCode::OK);
        let status_payload = status.json::<Value>().await.expect("parse status payload");
        assert_eq!(status_payload["auth"]["mode"], "password-session");
        assert_eq!(status_payload["auth"]["active_sessions"], 1);

        let stale = client
            .get(format!("http://{addr}{API_STATUS_ENDPOINT}"))
            .bearer_auth("mag_sess_0000000000000000")
            .send()
            .await
            .expect("send status request with unknown session");
        assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

        handle.abort();
    }

    #[tokio::test]
    async fn functional_auth_session_endpoint_requires_password_mode() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::Token),
        );
        let (addr, handle) = spawn_test_server(state).await;

        let response = Client::new()
            .post(format!("http://{addr}{API_AUTH_SESSION_ENDPOINT}"))
            .json(&json!({"password": "pw-secret"}))
            .send()
            .await
            .expect("send session request in token mode");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = response.json::<Value>().await.expect("parse error envelope");
        assert_eq!(payload["error"]["code"], "auth_mode_mismatch");

        handle.abort();
    }

    #[tokio::test]
    async fn functional_custom_command_endpoints_manage_store() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::LocalhostDev),
        );
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        let added = client
            .post(format!("http://{addr}{API_CUSTOM_ADD_ENDPOINT}"))
            .json(&json!({"guild_id": "g-1", "name": "Greet", "response": "hello there"}))
            .send()
            .await
            .expect("send add request");
        assert_eq!(added.status(), StatusCode::OK);
        assert_eq!(added.json::<Value>().await.expect("parse add payload")["ok"], true);

        let invalid = client
            .post(format!("http://{addr}{API_CUSTOM_ADD_ENDPOINT}"))
            .json(&json!({"guild_id": "g-1", "name": "has space", "response": "x"}))
            .send()
            .await
            .expect("send invalid add request");
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let invalid_payload = invalid.json::<Value>().await.expect("parse error envelope");
        assert_eq!(invalid_payload["error"]["code"], "invalid_name");

        let missing_guild = client
            .post(format!("http://{addr}{API_CUSTOM_ADD_ENDPOINT}"))
            .json(&json!({"guild_id": "  ", "name": "greet", "response": "x"}))
            .send()
            .await
            .expect("send guildless add request");
        assert_eq!(missing_guild.status(), StatusCode::BAD_REQUEST);

        let listed = client
            .get(format!(
                "http://{addr}{API_CUSTOM_LIST_ENDPOINT}?guild_id=g-1"
            ))
            .send()
            .await
            .expect("send list request");
        assert_eq!(listed.status(), StatusCode::OK);
        let listed_payload = listed.json::<Value>().await.expect("parse list payload");
        let commands = listed_payload["commands"].as_array().expect("commands array");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["name"], "greet");
        assert_eq!(commands[0]["response"], "hello there");

        let unlisted = client
            .get(format!("http://{addr}{API_CUSTOM_LIST_ENDPOINT}"))
            .send()
            .await
            .expect("send guildless list request");
        assert_eq!(unlisted.status(), StatusCode::BAD_REQUEST);

        let unknown = client
            .delete(format!("http://{addr}{API_CUSTOM_REMOVE_ENDPOINT}"))
            .json(&json!({"guild_id": "g-1", "name": "missing"}))
            .send()
            .await
            .expect("send unknown remove request");
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        let unknown_payload = unknown.json::<Value>().await.expect("parse error envelope");
        assert_eq!(unknown_payload["error"]["code"], "unknown_command");

        let removed = client
            .delete(format!("http://{addr}{API_CUSTOM_REMOVE_ENDPOINT}"))
            .json(&json!({"guild_id": "g-1", "name": "GREET"}))
            .send()
            .await
            .expect("send remove request");
        assert_eq!(removed.status(), StatusCode::OK);

        let empty = client
            .get(format!(
                "http://{addr}{API_CUSTOM_LIST_ENDPOINT}?guild_id=g-1"
            ))
            .send()
            .await
            .expect("send post-remove list request");
        let empty_payload = empty.json::<Value>().await.expect("parse list payload");
        assert!(empty_payload["commands"]
            .as_array()
            .expect("commands array")
            .is_empty());

        handle.abort();
    }

    #[tokio::test]
    async fn functional_send_endpoint_validates_and_forwards() {
        let server = MockServer::start();
        let send_mock = server.mock(|when, then| {
            when.method(POST).path("/channels/c-7/messages");
            then.status(200).json_body(json!({"id": "m-1"}));
        });
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            &server.base_url(),
            test_config(DashboardAuthMode::LocalhostDev),
        );
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        let missing = client
            .post(format!("http://{addr}{API_SEND_ENDPOINT}"))
            .json(&json!({"channel_id": "c-7", "message": "  "}))
            .send()
            .await
            .expect("send empty-message request");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let missing_payload = missing.json::<Value>().await.expect("parse error envelope");
        assert_eq!(missing_payload["error"]["code"], "missing_field");

        let sent = client
            .post(format!("http://{addr}{API_SEND_ENDPOINT}"))
            .json(&json!({"channel_id": "c-7", "message": "hello"}))
            .send()
            .await
            .expect("send message request");
        assert_eq!(sent.status(), StatusCode::OK);
        assert_eq!(sent.json::<Value>().await.expect("parse send payload")["ok"], true);
        send_mock.assert();

        handle.abort();
    }

    #[tokio::test]
    async fn functional_guild_and_channel_endpoints_proxy_rest_listings() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/@me/guilds");
            then.status(200).json_body(json!([
                {"id": "g2", "name": "zulu"},
                {"id": "g1", "name": "alfa"}
            ]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/guilds/g1/channels");
            then.status(200).json_body(json!([
                {"id": "c2", "name": "zeta", "type": 0},
                {"id": "c9", "name": "lounge", "type": 2},
                {"id": "c1", "name": "alpha", "type": 5}
            ]));
        });
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            &server.base_url(),
            test_config(DashboardAuthMode::LocalhostDev),
        );
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        let guilds = client
            .get(format!("http://{addr}{API_GUILDS_ENDPOINT}"))
            .send()
            .await
            .expect("send guilds request");
        assert_eq!(guilds.status(), StatusCode::OK);
        let guilds_payload = guilds.json::<Value>().await.expect("parse guilds payload");
        assert_eq!(guilds_payload["guilds"][0]["name"], "alfa");
        assert_eq!(guilds_payload["guilds"][1]["name"], "zulu");

        let channels = client
            .get(format!("http://{addr}{API_CHANNELS_ENDPOINT}?guild_id=g1"))
            .send()
            .await
            .expect("send channels request");
        assert_eq!(channels.status(), StatusCode::OK);
        let channels_payload = channels.json::<Value>().await.expect("parse channels payload");
        let listed = channels_payload["channels"].as_array().expect("channels array");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["name"], "alpha");
        assert_eq!(listed[1]["name"], "zeta");

        let missing = client
            .get(format!("http://{addr}{API_CHANNELS_ENDPOINT}"))
            .send()
            .await
            .expect("send guildless channels request");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        handle.abort();
    }

    #[tokio::test]
    async fn functional_slash_endpoints_round_trip_registry() {
        let server = MockServer::start();
        let list_mock = server.mock(|when, then| {
            when.method(GET).path("/applications/app-1/guilds/g-1/commands");
            then.status(200).json_body(json!([]));
        });
        let put_mock = server.mock(|when, then| {
            when.method(PUT).path("/applications/app-1/guilds/g-1/commands");
            then.status(200).json_body(json!([]));
        });
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            &server.base_url(),
            test_config(DashboardAuthMode::LocalhostDev),
        );
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        let created = client
            .post(format!("http://{addr}{API_SLASH_CREATE_ENDPOINT}"))
            .json(&json!({
                "scope": "guild",
                "guild_id": "g-1",
                "name": "My Cmd",
                "description": "says hi",
                "options": [{"name": "Who", "description": "target", "required": true}]
            }))
            .send()
            .await
            .expect("send slash create request");
        assert_eq!(created.status(), StatusCode::OK);
        let created_payload = created.json::<Value>().await.expect("parse create payload");
        assert_eq!(created_payload["ok"], true);
        assert_eq!(created_payload["name"], "my-cmd");
        put_mock.assert_calls(1);

        let listed = client
            .get(format!(
                "http://{addr}{API_SLASH_LIST_ENDPOINT}?scope=guild&guild_id=g-1"
            ))
            .send()
            .await
            .expect("send slash list request");
        assert_eq!(listed.status(), StatusCode::OK);
        assert!(listed.json::<Value>().await.expect("parse list payload")["commands"]
            .is_array());
        list_mock.assert_calls(2);

        let scope_missing = client
            .get(format!("http://{addr}{API_SLASH_LIST_ENDPOINT}?scope=guild"))
            .send()
            .await
            .expect("send guildless slash list request");
        assert_eq!(scope_missing.status(), StatusCode::BAD_REQUEST);

        let deleted = client
            .delete(format!("http://{addr}{API_SLASH_DELETE_ENDPOINT}"))
            .json(&json!({"scope": "guild", "guild_id": "g-1", "command_id": "123"}))
            .send()
            .await
            .expect("send slash delete request");
        assert_eq!(deleted.status(), StatusCode::OK);
        put_mock.assert_calls(2);

        let blank_id = client
            .delete(format!("http://{addr}{API_SLASH_DELETE_ENDPOINT}"))
            .json(&json!({"scope": "guild", "guild_id": "g-1", "command_id": "  "}))
            .send()
            .await
            .expect("send blank-id slash delete request");
        assert_eq!(blank_id.status(), StatusCode::BAD_REQUEST);

        handle.abort();
    }

    #[tokio::test]
    async fn functional_event_endpoints_expose_ring_days_and_validation() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::LocalhostDev),
        );
        {
            let mut recorder = state.recorder.lock().await;
            let mut event = Event::now(EventKind::Message);
            event.guild_id = "g-1".to_string();
            event.content = Some("hello".to_string());
            recorder.record(event);
            recorder.record(Event::info("booted"));
        }
        let (addr, handle) = spawn_test_server(Arc::clone(&state)).await;
        let client = Client::new();

        let all = client
            .get(format!("http://{addr}{API_EVENTS_ENDPOINT}"))
            .send()
            .await
            .expect("send events request");
        assert_eq!(all.status(), StatusCode::OK);
        let all_payload = all.json::<Value>().await.expect("parse events payload");
        assert_eq!(all_payload["events"].as_array().expect("events array").len(), 2);

        let filtered = client
            .get(format!("http://{addr}{API_EVENTS_ENDPOINT}?kind=message&guild_id=g-1"))
            .send()
            .await
            .expect("send filtered events request");
        let filtered_payload = filtered.json::<Value>().await.expect("parse events payload");
        let filtered_events = filtered_payload["events"].as_array().expect("events array");
        assert_eq!(filtered_events.len(), 1);
        assert_eq!(filtered_events[0]["type"], "message");

        let bad_kind = client
            .get(format!("http://{addr}{API_EVENTS_ENDPOINT}?kind=cosmic"))
            .send()
            .await
            .expect("send bad-kind events request");
        assert_eq!(bad_kind.status(), StatusCode::BAD_REQUEST);
        let bad_kind_payload = bad_kind.json::<Value>().await.expect("parse error envelope");
        assert_eq!(bad_kind_payload["error"]["code"], "invalid_kind");

        let days = client
            .get(format!("http://{addr}{API_EVENT_DAYS_ENDPOINT}"))
            .send()
            .await
            .expect("send days request");
        assert_eq!(days.status(), StatusCode::OK);
        let days_payload = days.json::<Value>().await.expect("parse days payload");
        let day_list = days_payload["days"].as_array().expect("days array");
        assert_eq!(day_list.len(), 1);
        let day = day_list[0].as_str().expect("day stamp").to_string();

        let detail = client
            .get(format!("http://{addr}{API_EVENT_DAYS_ENDPOINT}/{day}"))
            .send()
            .await
            .expect("send day detail request");
        assert_eq!(detail.status(), StatusCode::OK);
        let detail_payload = detail.json::<Value>().await.expect("parse detail payload");
        assert_eq!(detail_payload["date"], day.as_str());
        assert_eq!(detail_payload["lines"].as_array().expect("lines array").len(), 2);

        let absent = client
            .get(format!("http://{addr}{API_EVENT_DAYS_ENDPOINT}/1999-01-01"))
            .send()
            .await
            .expect("send absent day request");
        assert_eq!(absent.status(), StatusCode::NOT_FOUND);

        let malformed = client
            .get(format!("http://{addr}{API_EVENT_DAYS_ENDPOINT}/not-a-day"))
            .send()
            .await
            .expect("send malformed day request");
        assert_eq!(malformed.status(), StatusCode::NOT_FOUND);

        handle.abort();
    }

    #[tokio::test]
    async fn functional_log_stream_authorizes_and_emits_frames() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::Token),
        );
        let (addr, handle) = spawn_test_server(Arc::clone(&state)).await;
        let client = Client::new();

        let denied = client
            .get(format!("http://{addr}{API_LOG_STREAM_ENDPOINT}"))
            .send()
            .await
            .expect("send credential-less stream request");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let mut response = client
            .get(format!(
                "http://{addr}{API_LOG_STREAM_ENDPOINT}?access_token=secret-token"
            ))
            .send()
            .await
            .expect("open event stream");
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/event-stream"));

        {
            let mut recorder = state.recorder.lock().await;
            recorder.record(Event::info("follow-up"));
        }

        let mut collected = String::new();
        for _ in 0..10 {
            let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
                .await
                .expect("stream chunk before timeout")
                .expect("read stream chunk")
                .expect("stream still open");
            collected.push_str(&String::from_utf8_lossy(&chunk));
            if collected.contains("follow-up") {
                break;
            }
        }
        assert!(collected.contains("event: info"));
        assert!(collected.contains("stream opened"));
        assert!(collected.contains("follow-up"));

        handle.abort();
    }

    #[tokio::test]
    async fn functional_rate_limit_rejects_excess_requests() {
        let temp = tempdir().expect("tempdir");
        let mut config = test_config(DashboardAuthMode::LocalhostDev);
        config.rate_limit_max_requests = 2;
        let state = test_state(temp.path(), "http://127.0.0.1:9", config);
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        for _ in 0..2 {
            let accepted = client
                .get(format!("http://{addr}{API_STATUS_ENDPOINT}"))
                .send()
                .await
                .expect("send status request");
            assert_eq!(accepted.status(), StatusCode::OK);
        }
        let limited = client
            .get(format!("http://{addr}{API_STATUS_ENDPOINT}"))
            .send()
            .await
            .expect("send over-limit status request");
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        let payload = limited.json::<Value>().await.expect("parse error envelope");
        assert_eq!(payload["error"]["code"], "rate_limited");

        handle.abort();
    }

    #[tokio::test]
    async fn functional_interactions_webhook_verifies_ping_signatures() {
        let signing_key = SigningKey::from_bytes(&[7; 32]);
        let temp = tempdir().expect("tempdir");
        let mut config = test_config(DashboardAuthMode::LocalhostDev);
        config.interactions_public_key =
            Some(encode_hex(signing_key.verifying_key().as_bytes()));
        let state = test_state(temp.path(), "http://127.0.0.1:9", config);
        let (addr, handle) = spawn_test_server(state).await;
        let client = Client::new();

        let body = r#"{"type":1}"#;
        let timestamp = "1700000000";
        let signature_hex = sign_interaction(&signing_key, timestamp, body);

        let pong = client
            .post(format!("http://{addr}{API_INTERACTIONS_ENDPOINT}"))
            .header(INTERACTION_SIGNATURE_HEADER, &signature_hex)
            .header(INTERACTION_TIMESTAMP_HEADER, timestamp)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("send signed ping interaction");
        assert_eq!(pong.status(), StatusCode::OK);
        assert_eq!(pong.json::<Value>().await.expect("parse pong payload")["type"], 1);

        let tampered = client
            .post(format!("http://{addr}{API_INTERACTIONS_ENDPOINT}"))
            .header(INTERACTION_SIGNATURE_HEADER, &signature_hex)
            .header(INTERACTION_TIMESTAMP_HEADER, timestamp)
            .header("content-type", "application/json")
            .body(r#"{"type":1,"tampered":true}"#)
            .send()
            .await
            .expect("send tampered interaction");
        assert_eq!(tampered.status(), StatusCode::UNAUTHORIZED);
        let tampered_payload = tampered.json::<Value>().await.expect("parse error envelope");
        assert_eq!(tampered_payload["error"]["code"], "invalid_signature");

        let unsigned = client
            .post(format!("http://{addr}{API_INTERACTIONS_ENDPOINT}"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("send unsigned interaction");
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        handle.abort();
    }

    #[tokio::test]
    async fn functional_interactions_webhook_requires_configured_key() {
        let temp = tempdir().expect("tempdir");
        let state = test_state(
            temp.path(),
            "http://127.0.0.1:9",
            test_config(DashboardAuthMode::LocalhostDev),
        );
        let (addr, handle) = spawn_test_server(state).await;

        let response = Client::new()
            .post(format!("http://{addr}{API_INTERACTIONS_ENDPOINT}"))
            .header("content-type", "application/json")
            .body(r#"{"type":1}"#)
            .send()
            .await
            .expect("send interaction without configured key");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        handle.abort();
    }

    #[tokio::test]
    async fn functional_interactions_webhook_dispatches_slash_commands() {
        let signing_key = SigningKey::from_bytes(&[9; 32]);
        let temp = tempdir().expect("tempdir");
        let mut config = test_config(DashboardAuthMode::LocalhostDev);
        config.interactions_public_key =
            Some(encode_hex(signing_key.verifying_key().as_bytes()));
        let state = test_state(temp.path(), "http://127.0.0.1:9", config);
        let (addr, handle) = spawn_test_server(Arc::clone(&state)).await;
        let client = Client::new();

        let body = json!({
            "type": 2,
            "guild_id": "g-1",
            "channel_id": "c-1",
            "member": {"user": {"id": "u-1", "username": "ada", "discriminator": "0"}},
            "data": {"name": "ping", "options": []}
        })
        .to_string();
        let timestamp = "1700000001";
        let signature_hex = sign_interaction(&signing_key, timestamp, &body);

        let response = client
            .post(format!("http://{addr}{API_INTERACTIONS_ENDPOINT}"))
            .header(INTERACTION_SIGNATURE_HEADER, &signature_hex)
            .header(INTERACTION_TIMESTAMP_HEADER, timestamp)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("send signed command interaction");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = response.json::<Value>().await.expect("parse callback payload");
        assert_eq!(payload["type"], 4);
        assert!(payload["data"]["content"]
            .as_str()
            .expect("reply content")
            .contains("pong"));
        assert_eq!(payload["data"]["flags"], 64);

        let recorded = state.recorder.lock().await.query(&EventQuery::default());
        assert!(recorded.iter().any(|event| {
            event.kind == EventKind::Slash && event.command_name.as_deref() == Some("ping")
        }));

        let unsupported = json!({"type": 3}).to_string();
        let unsupported_signature = sign_interaction(&signing_key, timestamp, &unsupported);
        let rejected = client
            .post(format!("http://{addr}{API_INTERACTIONS_ENDPOINT}"))
            .header(INTERACTION_SIGNATURE_HEADER, &unsupported_signature)
            .header(INTERACTION_TIMESTAMP_HEADER, timestamp)
            .header("content-type", "application/json")
            .body(unsupported)
            .send()
            .await
            .expect("send unsupported interaction type");
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        handle.abort();
    }
}
