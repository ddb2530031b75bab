//! Signaling server error types.
//!
//! Protocol failures surface to the originating client as an `error` event
//! carrying `client_message()`. Internal details (ids, engine errors) are
//! logged server-side but not exposed to clients.

use huddle_media::EngineError;
use thiserror::Error;

/// Signaling server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Room does not exist.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Participant is not registered in the room.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Transport id does not belong to the requesting participant.
    #[error("Transport not found: {0}")]
    TransportNotFound(String),

    /// Consumer id does not belong to the requesting participant.
    #[error("Consumer not found: {0}")]
    ConsumerNotFound(String),

    /// No router bound yet (capabilities requested before joining).
    #[error("No router available")]
    NoRouter,

    /// Operation requires room membership.
    #[error("Not in a room")]
    NotInRoom,

    /// Consumer capabilities cannot consume the producer.
    #[error("Incompatible capabilities for producer: {0}")]
    IncompatibleCapabilities(String),

    /// Media engine operation failed.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl ServerError {
    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            ServerError::RoomNotFound(_) => "Room not found".to_string(),
            ServerError::ParticipantNotFound(_) => "Participant not found".to_string(),
            ServerError::TransportNotFound(_) => "Transport not found".to_string(),
            ServerError::ConsumerNotFound(_) => "Consumer not found".to_string(),
            ServerError::NoRouter => "No router available".to_string(),
            ServerError::NotInRoom => "Not in a room".to_string(),
            ServerError::IncompatibleCapabilities(_) => "Cannot consume this producer".to_string(),
            ServerError::Engine(_) => "An internal error occurred".to_string(),
        }
    }

    /// Stable label for error metrics.
    pub fn metric_kind(&self) -> &'static str {
        match self {
            ServerError::RoomNotFound(_) => "room_not_found",
            ServerError::ParticipantNotFound(_) => "participant_not_found",
            ServerError::TransportNotFound(_) => "transport_not_found",
            ServerError::ConsumerNotFound(_) => "consumer_not_found",
            ServerError::NoRouter => "no_router",
            ServerError::NotInRoom => "not_in_room",
            ServerError::IncompatibleCapabilities(_) => "incompatible_capabilities",
            ServerError::Engine(_) => "engine",
        }
    }
}
