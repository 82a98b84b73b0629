//! AuthN/AuthZ and rate-limit runtime for the dashboard API.

use std::collections::BTreeMap;

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use serde::Serialize;

use magpie_core::{current_unix_timestamp_ms, is_expired_unix};

use crate::server::DashboardState;
use crate::types::{AuthSessionResponse, DashboardApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `DashboardAuthMode` values.
pub enum DashboardAuthMode {
    Token,
    PasswordSession,
    LocalhostDev,
}

impl DashboardAuthMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::PasswordSession => "password-session",
            Self::LocalhostDev => "localhost-dev",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "token" => Some(Self::Token),
            "password-session" => Some(Self::PasswordSession),
            "localhost-dev" => Some(Self::LocalhostDev),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Public struct `AuthRuntimeState` used across Magpie components.
pub struct AuthRuntimeState {
    pub(crate) sessions: BTreeMap<String, SessionTokenState>,
    pub(crate) total_sessions_issued: u64,
    pub(crate) auth_failures: u64,
    pub(crate) rate_limited_requests: u64,
    pub(crate) rate_limit_buckets: BTreeMap<String, RateLimitBucket>,
}

#[derive(Debug, Clone)]
pub(crate) struct SessionTokenState {
    pub(crate) expires_unix_ms: u64,
    pub(crate) last_seen_unix_ms: u64,
    pub(crate) request_count: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RateLimitBucket {
    pub(crate) window_started_unix_ms: u64,
    pub(crate) accepted_requests: usize,
    pub(crate) rejected_requests: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Auth counters embedded in the status endpoint payload.
pub struct AuthStatusReport {
    mode: String,
    session_ttl_seconds: u64,
    active_sessions: usize,
    total_sessions_issued: u64,
    auth_failures: u64,
    rate_limited_requests: u64,
    rate_limit_window_seconds: u64,
    rate_limit_max_requests: usize,
}

pub(crate) fn bearer_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?;
    let raw = header.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn note_auth_failure(state: &DashboardState) {
    if let Ok(mut auth_state) = state.auth_runtime.lock() {
        auth_state.auth_failures = auth_state.auth_failures.saturating_add(1);
    }
}

pub(crate) fn prune_expired_sessions(auth_state: &mut AuthRuntimeState, now_unix_ms: u64) {
    auth_state
        .sessions
        .retain(|_, session| !is_expired_unix(Some(session.expires_unix_ms), now_unix_ms));
}

pub(crate) fn authorize_dashboard_request(
    state: &DashboardState,
    headers: &HeaderMap,
) -> Result<String, DashboardApiError> {
    authorize_with_credential(state, bearer_token_from_headers(headers))
}

/// Credential may arrive as a bearer header or, for the SSE stream, an
/// `access_token` query parameter; both paths land here.
pub(crate) fn authorize_with_credential(
    state: &DashboardState,
    observed: Option<String>,
) -> Result<String, DashboardApiError> {
    match state.config.auth_mode {
        DashboardAuthMode::LocalhostDev => Ok("localhost-dev".to_string()),
        DashboardAuthMode::Token => {
            let expected = state
                .config
                .auth_token
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    DashboardApiError::internal("dashboard token auth mode is misconfigured")
                })?;
            let Some(observed) = observed else {
                note_auth_failure(state);
                return Err(DashboardApiError::unauthorized());
            };
            if observed != expected {
                note_auth_failure(state);
                return Err(DashboardApiError::unauthorized());
            }
            Ok("token".to_string())
        }
        DashboardAuthMode::PasswordSession => {
            let Some(session_token) = observed else {
                note_auth_failure(state);
                return Err(DashboardApiError::unauthorized());
            };
            let now_unix_ms = current_unix_timestamp_ms();
            let mut auth_state = state
                .auth_runtime
                .lock()
                .map_err(|_| DashboardApiError::internal("dashboard auth state lock poisoned"))?;
            prune_expired_sessions(&mut auth_state, now_unix_ms);
            if let Some(session) = auth_state.sessions.get_mut(session_token.as_str()) {
                session.last_seen_unix_ms = now_unix_ms;
                session.request_count = session.request_count.saturating_add(1);
                return Ok(format!("session:{session_token}"));
            }
            auth_state.auth_failures = auth_state.auth_failures.saturating_add(1);
            Err(DashboardApiError::unauthorized())
        }
    }
}

pub(crate) fn enforce_rate_limit(
    state: &DashboardState,
    principal: &str,
) -> Result<(), DashboardApiError> {
    let window_ms = state
        .config
        .rate_limit_window_seconds
        .saturating_mul(1000)
        .max(1);
    let max_requests = state.config.rate_limit_max_requests.max(1);
    let now_unix_ms = current_unix_timestamp_ms();
    let mut auth_state = state
        .auth_runtime
        .lock()
        .map_err(|_| DashboardApiError::internal("dashboard auth state lock poisoned"))?;

    let bucket = auth_state
        .rate_limit_buckets
        .entry(principal.to_string())
        .or_default();
    if bucket.window_started_unix_ms == 0
        || now_unix_ms.saturating_sub(bucket.window_started_unix_ms) >= window_ms
    {
        bucket.window_started_unix_ms = now_unix_ms;
        bucket.accepted_requests = 0;
        bucket.rejected_requests = 0;
    }
    if bucket.accepted_requests >= max_requests {
        bucket.rejected_requests = bucket.rejected_requests.saturating_add(1);
        auth_state.rate_limited_requests = auth_state.rate_limited_requests.saturating_add(1);
        return Err(DashboardApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            format!(
                "dashboard rate limit exceeded: max {} requests per {} seconds",
                max_requests, state.config.rate_limit_window_seconds
            ),
        ));
    }
    bucket.accepted_requests = bucket.accepted_requests.saturating_add(1);
    Ok(())
}

pub(crate) fn issue_session_token(
    state: &DashboardState,
    password: &str,
) -> Result<AuthSessionResponse, DashboardApiError> {
    let expected_password = state
        .config
        .auth_password
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DashboardApiError::internal("dashboard password auth is misconfigured"))?;
    if password.trim().is_empty() || password.trim() != expected_password {
        note_auth_failure(state);
        return Err(DashboardApiError::new(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid dashboard password",
        ));
    }

    let now_unix_ms = current_unix_timestamp_ms();
    let ttl_ms = state
        .config
        .session_ttl_seconds
        .saturating_mul(1000)
        .max(1000);
    let expires_unix_ms = now_unix_ms.saturating_add(ttl_ms);
    let access_token = format!("mag_sess_{:016x}", state.next_sequence());
    let mut auth_state = state
        .auth_runtime
        .lock()
        .map_err(|_| DashboardApiError::internal("dashboard auth state lock poisoned"))?;
    prune_expired_sessions(&mut auth_state, now_unix_ms);
    auth_state.sessions.insert(
        access_token.clone(),
        SessionTokenState {
            expires_unix_ms,
            last_seen_unix_ms: now_unix_ms,
            request_count: 0,
        },
    );
    auth_state.total_sessions_issued = auth_state.total_sessions_issued.saturating_add(1);
    Ok(AuthSessionResponse {
        access_token,
        token_type: "bearer",
        expires_unix_ms,
        expires_in_seconds: state.config.session_ttl_seconds,
    })
}

pub(crate) fn collect_auth_status_report(state: &DashboardState) -> AuthStatusReport {
    let mut active_sessions = 0usize;
    let mut total_sessions_issued = 0u64;
    let mut auth_failures = 0u64;
    let mut rate_limited_requests = 0u64;
    if let Ok(mut auth_state) = state.auth_runtime.lock() {
        prune_expired_sessions(&mut auth_state, current_unix_timestamp_ms());
        active_sessions = auth_state.sessions.len();
        total_sessions_issued = auth_state.total_sessions_issued;
        auth_failures = auth_state.auth_failures;
        rate_limited_requests = auth_state.rate_limited_requests;
    }
    AuthStatusReport {
        mode: state.config.auth_mode.as_str().to_string(),
        session_ttl_seconds: state.config.session_ttl_seconds,
        active_sessions,
        total_sessions_issued,
        auth_failures,
        rate_limited_requests,
        rate_limit_window_seconds: state.config.rate_limit_window_seconds,
        rate_limit_max_requests: state.config.rate_limit_max_requests,
    }
}
