use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::auth::SessionUser;
use crate::response::{json_error, ok, AppError};
use crate::services::assistant::{AssistantError, ChatMessage};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatReply {
    message: String,
}

async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;

    let assistant = state.assistant();
    if !assistant.is_available() {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "ASSISTANT_UNAVAILABLE",
            "AI assistant is not configured",
        ));
    }

    match assistant.reply(&payload.messages).await {
        Ok(message) => Ok(ok(ChatReply { message })),
        Err(AssistantError::InvalidConversation(reason)) => Err(AppError::validation(reason)),
        Err(err) => {
            tracing::warn!(error = %err, user_id = %user.id, "assistant request failed");
            Err(json_error(
                StatusCode::BAD_GATEWAY,
                "ASSISTANT_FAILED",
                "Failed to get a response from the AI assistant",
            ))
        }
    }
}
