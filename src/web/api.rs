//! Request handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::inbox::InboxSnapshot;
use crate::receiver::{Health, Receiver};

/// `POST /`: receive one envelope.
pub async fn receive(State(receiver): State<Arc<Receiver>>, body: Bytes) -> Response {
    match receiver.receive(&body).await {
        // The reply task, if any, keeps running detached.
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt.ack)).into_response(),
        Err(e) => {
            tracing::warn!("Rejected request: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid JSON" })),
            )
                .into_response()
        }
    }
}

/// `GET /inbox`: non-destructive snapshot.
pub async fn inbox(State(receiver): State<Arc<Receiver>>) -> Json<InboxSnapshot> {
    Json(receiver.inbox().snapshot())
}

/// `GET /health`.
pub async fn health(State(receiver): State<Arc<Receiver>>) -> Json<Health> {
    Json(receiver.health())
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
