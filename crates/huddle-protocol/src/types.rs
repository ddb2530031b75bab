//! Shared domain types for the signaling protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media kind of a producer or consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Wire representation (`"audio"` / `"video"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a transport relative to the client.
///
/// Serialized as `"send"` / `"recv"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportDirection {
    #[serde(rename = "send")]
    Send,
    #[serde(rename = "recv")]
    Recv,
}

impl fmt::Display for TransportDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportDirection::Send => f.write_str("send"),
            TransportDirection::Recv => f.write_str("recv"),
        }
    }
}

/// Participant identity as exposed to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: String,
    pub name: String,
}

macro_rules! opaque_params {
    ($(#[$doc:meta] $name:ident),+ $(,)?) => {
        $(
            #[$doc]
            ///
            /// Opaque to the signaling layer: carried through unchanged
            /// between the client's media stack and the media engine.
            #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub serde_json::Value);

            impl $name {
                /// True when the blob carries an actual value (presence check
                /// only - the internal schema is never validated here).
                #[must_use]
                pub fn is_present(&self) -> bool {
                    !self.0.is_null()
                }
            }
        )+
    };
}

opaque_params! {
    /// Codec/header-extension capability description of a router or endpoint.
    RtpCapabilities,
    /// RTP send/receive parameters of a producer or consumer.
    RtpParameters,
    /// DTLS negotiation parameters (role, fingerprints).
    DtlsParameters,
    /// ICE negotiation parameters (ufrag, password).
    IceParameters,
    /// ICE candidate list for a transport.
    IceCandidates,
}
