//! Huddle signaling wire protocol.
//!
//! Defines the message types exchanged over the persistent signaling
//! connection between a client and the room server, plus the small set of
//! shared domain types (media kind, transport direction, participant
//! summaries) and the opaque negotiation-parameter blobs.
//!
//! # Wire format
//!
//! Messages travel as JSON objects with an internal `type` tag carrying the
//! message name (`join-room`, `new-producer`, ...) and the payload fields
//! inlined in camelCase next to it:
//!
//! ```json
//! {"type":"new-producer","producerId":"...","participantId":"...","kind":"video"}
//! ```
//!
//! Message names and payload field names are a compatibility surface for
//! deployed clients; changing either is a breaking protocol change.
//!
//! # Opaque parameters
//!
//! ICE/DTLS/RTP parameter blobs are negotiated between the client's media
//! stack and the media engine. This layer never interprets them - they are
//! newtypes around raw JSON values, passed through byte-equivalent.

pub mod messages;
pub mod types;

pub use messages::{ClientMessage, ServerEvent};
pub use types::{
    DtlsParameters, IceCandidates, IceParameters, MediaKind, ParticipantSummary, RtpCapabilities,
    RtpParameters, TransportDirection,
};
