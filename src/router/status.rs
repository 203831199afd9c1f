//! Liveness probe.

use axum::Json;

use super::Message;

/// Always `{"message":"ok"}` while the server runs.
pub async fn healthz() -> Json<Message> {
    Json(Message::new("ok"))
}
