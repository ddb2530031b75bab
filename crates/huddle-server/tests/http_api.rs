//! Room HTTP API tests, driven through the router with `oneshot`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use huddle_media::LoopbackEngine;
use huddle_server::http::api_router;
use huddle_server::registry::RoomRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app() -> (Router, Arc<RoomRegistry>) {
    let registry = Arc::new(RoomRegistry::new(Arc::new(LoopbackEngine::default())));
    (api_router(Arc::clone(&registry)), registry)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/rooms/create")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn create_room_returns_201_with_join_path() {
    let (app, _) = app();

    let response = app
        .oneshot(create_request(r#"{"name": "standup"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["roomName"], "standup");
    let room_id = body["roomId"].as_str().unwrap();
    assert_eq!(body["joinPath"], format!("/room/{room_id}"));
}

#[tokio::test]
async fn create_room_rejects_blank_name() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(create_request(r#"{"name": "   "}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Room name is required"})
    );

    let response = app.oneshot(create_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn room_details_reflect_registry_state() {
    let (app, registry) = app();
    let room = registry.create_room("standup").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/rooms/{}", room.room_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["roomId"], room.room_id.as_str());
    assert_eq!(body["roomName"], "standup");
    assert_eq!(body["participantCount"], 0);
    assert_eq!(body["participants"], json!([]));
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn unknown_room_is_404() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rooms/no-such-room")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"error": "Room not found"}));
}

#[tokio::test]
async fn exists_probe_tracks_room_lifetime() {
    let (app, registry) = app();
    let room = registry.create_room("standup").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/rooms/{}/exists", room.room_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"exists": true}));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rooms/gone/exists")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"exists": false}));
}
