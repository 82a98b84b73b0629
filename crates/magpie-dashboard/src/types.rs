//! Error envelope and request bodies for the dashboard JSON API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use magpie_gateway::{GatewayError, GatewayErrorCode};

/// Error payload mapped onto the dashboard HTTP response envelope.
#[derive(Debug)]
pub struct DashboardApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl DashboardApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        )
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn gateway_failure(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for DashboardApiError {
    fn into_response(self) -> Response {
        let error_type = if self.status.is_client_error() {
            "invalid_request_error"
        } else {
            "server_error"
        };
        (
            self.status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

impl From<GatewayError> for DashboardApiError {
    fn from(error: GatewayError) -> Self {
        let code = error.code.as_str();
        match error.code {
            GatewayErrorCode::InvalidRequest => Self::bad_request(code, error.message),
            GatewayErrorCode::NotFound => Self::not_found(code, error.message),
            GatewayErrorCode::MissingConfig => Self::internal(error.message),
            GatewayErrorCode::AuthFailed
            | GatewayErrorCode::RateLimited
            | GatewayErrorCode::UpstreamUnavailable
            | GatewayErrorCode::TransportError
            | GatewayErrorCode::ParseFailed => Self::gateway_failure(code, error.message),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CustomAddRequest {
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CustomRemoveRequest {
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct SlashOptionBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct SlashCreateRequest {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<SlashOptionBody>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SlashDeleteRequest {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub command_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthSessionRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthSessionResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_unix_ms: u64,
    pub expires_in_seconds: u64,
}
