use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docent_core::ChatError;

use super::server::AppState;

pub(crate) const EMPTY_MESSAGE_DETAIL: &str = "`message` cannot be empty.";
pub(crate) const INTERNAL_ERROR_DETAIL: &str = "Internal server error. Please try again later.";

#[derive(serde::Deserialize)]
pub(crate) struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(serde::Serialize)]
pub(crate) struct ChatReply {
    session_id: String,
    response: String,
}

#[derive(serde::Serialize)]
struct WelcomeResponse {
    message: &'static str,
    status: &'static str,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    uptime_secs: u64,
}

/// Error body shaped as `{"detail": ...}`.
pub(crate) struct ApiError {
    status: StatusCode,
    detail: serde_json::Value,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<serde_json::Value>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StatusCode::PAYLOAD_TOO_LARGE
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        };
        Self::new(status, rejection.body_text())
    }
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(payload) = payload?;
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, EMPTY_MESSAGE_DETAIL));
    }

    match state.chat.chat(&payload.session_id, message).await {
        Ok(response) => Ok(Json(ChatReply {
            session_id: payload.session_id,
            response,
        })),
        Err(ChatError::EmptyMessage) => {
            Err(ApiError::new(StatusCode::BAD_REQUEST, EMPTY_MESSAGE_DETAIL))
        }
        Err(e) => {
            tracing::error!(session_id = %payload.session_id, "chat turn failed: {e:#}");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL))
        }
    }
}

pub(crate) async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

pub(crate) async fn welcome_handler() -> impl IntoResponse {
    Json(WelcomeResponse {
        message: "Welcome! POST JSON `{ session_id, message }` to /chat.",
        status: "healthy",
    })
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        message: "Service is running",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "healthy",
            message: "Service is running",
            uptime_secs: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_secs\":42"));
    }

    #[test]
    fn chat_request_deserializes() {
        let json = r#"{"session_id":"abc","message":"What is DocuMed?"}"#;
        let payload: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(payload.session_id, "abc");
        assert_eq!(payload.message, "What is DocuMed?");
    }

    #[test]
    fn chat_request_requires_both_fields() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"message":"hi"}"#).is_err());
        assert!(serde_json::from_str::<ChatRequest>(r#"{"session_id":"s"}"#).is_err());
    }

    #[test]
    fn api_error_body_has_detail() {
        let resp = ApiError::new(StatusCode::BAD_REQUEST, EMPTY_MESSAGE_DETAIL).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
