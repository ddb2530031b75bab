//! Signaling messages exchanged over the persistent connection.
//!
//! `ClientMessage` flows client -> server, `ServerEvent` flows server ->
//! client. Variant tags and payload field names are the deployed wire
//! contract and must not change.

use crate::types::{
    DtlsParameters, IceCandidates, IceParameters, MediaKind, ParticipantSummary, RtpCapabilities,
    RtpParameters, TransportDirection,
};
use serde::{Deserialize, Serialize};

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        participant_name: String,
    },

    /// Re-request the bound router's capability description.
    GetRtpCapabilities,

    #[serde(rename_all = "camelCase")]
    CreateTransport { direction: TransportDirection },

    #[serde(rename_all = "camelCase")]
    ConnectTransport {
        transport_id: String,
        dtls_parameters: DtlsParameters,
    },

    #[serde(rename_all = "camelCase")]
    Produce {
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },

    #[serde(rename_all = "camelCase")]
    Consume {
        transport_id: String,
        producer_id: String,
        rtp_capabilities: RtpCapabilities,
    },

    #[serde(rename_all = "camelCase")]
    ResumeConsumer { consumer_id: String },

    LeaveRoom,
}

/// Events the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RtpCapabilities { rtp_capabilities: RtpCapabilities },

    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: String,
        participant_id: String,
        participants: Vec<ParticipantSummary>,
    },

    #[serde(rename_all = "camelCase")]
    ParticipantJoined { participant: ParticipantSummary },

    #[serde(rename_all = "camelCase")]
    ParticipantLeft { participant_id: String },

    /// Announces a peer's stream. Also replayed synthetically during join so
    /// late joiners discover producers that predate them.
    #[serde(rename_all = "camelCase")]
    NewProducer {
        producer_id: String,
        participant_id: String,
        kind: MediaKind,
    },

    #[serde(rename_all = "camelCase")]
    TransportCreated {
        id: String,
        ice_parameters: IceParameters,
        ice_candidates: IceCandidates,
        dtls_parameters: DtlsParameters,
        direction: TransportDirection,
    },

    #[serde(rename_all = "camelCase")]
    TransportConnected { transport_id: String },

    #[serde(rename_all = "camelCase")]
    ProducerCreated { id: String, kind: MediaKind },

    #[serde(rename_all = "camelCase")]
    ConsumerCreated {
        id: String,
        producer_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },

    #[serde(rename_all = "camelCase")]
    ConsumerResumed { consumer_id: String },

    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_room_wire_shape() {
        let msg = ClientMessage::JoinRoom {
            room_id: "room-1".to_string(),
            participant_name: "Alice".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "join-room",
                "roomId": "room-1",
                "participantName": "Alice",
            })
        );
    }

    #[test]
    fn leave_room_has_empty_payload() {
        let value = serde_json::to_value(ClientMessage::LeaveRoom).unwrap();
        assert_eq!(value, json!({"type": "leave-room"}));
    }

    #[test]
    fn consume_field_names_are_camel_case() {
        let msg = ClientMessage::Consume {
            transport_id: "t-1".to_string(),
            producer_id: "p-1".to_string(),
            rtp_capabilities: RtpCapabilities(json!({"codecs": []})),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "consume",
                "transportId": "t-1",
                "producerId": "p-1",
                "rtpCapabilities": {"codecs": []},
            })
        );
    }

    #[test]
    fn new_producer_wire_shape() {
        let event = ServerEvent::NewProducer {
            producer_id: "prod-9".to_string(),
            participant_id: "part-3".to_string(),
            kind: MediaKind::Video,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "new-producer",
                "producerId": "prod-9",
                "participantId": "part-3",
                "kind": "video",
            })
        );
    }

    #[test]
    fn transport_created_carries_negotiation_blobs_verbatim() {
        let event = ServerEvent::TransportCreated {
            id: "t-7".to_string(),
            ice_parameters: IceParameters(json!({"usernameFragment": "uf", "password": "pw"})),
            ice_candidates: IceCandidates(json!([{"ip": "10.0.0.1", "port": 4443}])),
            dtls_parameters: DtlsParameters(json!({"role": "auto"})),
            direction: TransportDirection::Recv,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "transport-created",
                "id": "t-7",
                "iceParameters": {"usernameFragment": "uf", "password": "pw"},
                "iceCandidates": [{"ip": "10.0.0.1", "port": 4443}],
                "dtlsParameters": {"role": "auto"},
                "direction": "recv",
            })
        );
    }

    #[test]
    fn client_message_round_trip() {
        let messages = vec![
            ClientMessage::GetRtpCapabilities,
            ClientMessage::CreateTransport {
                direction: TransportDirection::Send,
            },
            ClientMessage::ConnectTransport {
                transport_id: "t-1".to_string(),
                dtls_parameters: DtlsParameters(json!({"role": "client"})),
            },
            ClientMessage::ResumeConsumer {
                consumer_id: "c-1".to_string(),
            },
        ];
        for msg in messages {
            let text = serde_json::to_string(&msg).unwrap();
            let back: ClientMessage = serde_json::from_str(&text).unwrap();
            assert_eq!(back, msg);
        }
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "mute-everyone"}"#);
        assert!(result.is_err());
    }
}
