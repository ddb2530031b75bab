//! Room HTTP API.
//!
//! Implements the room management endpoints:
//!
//! - `POST /api/rooms/create` - Create a room (201, or 400 on empty name)
//! - `GET /api/rooms/{id}` - Room details and member list (404 if unknown)
//! - `GET /api/rooms/{id}/exists` - Cheap pre-join existence probe
//!
//! Error responses are `{"error": "<message>"}` with the matching status.

use crate::registry::RoomRegistry;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use huddle_protocol::ParticipantSummary;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomResponse {
    room_id: String,
    room_name: String,
    join_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomDetailsResponse {
    room_id: String,
    room_name: String,
    created_at: chrono::DateTime<chrono::Utc>,
    participant_count: usize,
    participants: Vec<ParticipantSummary>,
}

#[derive(Debug, Serialize)]
struct RoomExistsResponse {
    exists: bool,
}

/// Handler for POST /api/rooms/create
async fn create_room(
    State(registry): State<Arc<RoomRegistry>>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Room name is required".to_string()));
    }

    let room = registry.create_room(name).await;
    info!(
        target: "huddle.http",
        room_id = %room.room_id,
        room_name = %room.room_name,
        "Room created via API"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            join_path: format!("/room/{}", room.room_id),
            room_id: room.room_id,
            room_name: room.room_name,
        }),
    ))
}

/// Handler for GET /api/rooms/{id}
async fn room_details(
    State(registry): State<Arc<RoomRegistry>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailsResponse>, ApiError> {
    let snapshot = registry
        .room_snapshot(&room_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Room not found".to_string()))?;

    Ok(Json(RoomDetailsResponse {
        room_id: snapshot.room_id,
        room_name: snapshot.room_name,
        created_at: snapshot.created_at,
        participant_count: snapshot.participants.len(),
        participants: snapshot.participants,
    }))
}

/// Handler for GET /api/rooms/{id}/exists
async fn room_exists(
    State(registry): State<Arc<RoomRegistry>>,
    Path(room_id): Path<String>,
) -> Json<RoomExistsResponse> {
    Json(RoomExistsResponse {
        exists: registry.room_exists(&room_id).await,
    })
}

/// Room API routes, to be merged into the server's root router.
pub fn api_router(registry: Arc<RoomRegistry>) -> Router {
    Router::new()
        .route("/api/rooms/create", post(create_room))
        .route("/api/rooms/:room_id", get(room_details))
        .route("/api/rooms/:room_id/exists", get(room_exists))
        .with_state(registry)
}
