//! Local model of a server-side transport.
//!
//! The controller mirrors each transport the server creates for it and
//! tracks its negotiation lifecycle: `Created` (announced by the server),
//! `Connecting` (DTLS answer sent), `Connected` (server confirmed).

use huddle_protocol::{DtlsParameters, IceCandidates, IceParameters, TransportDirection};

/// Negotiation state of a local transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Created,
    Connecting,
    Connected,
}

/// Client-side view of one transport.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    pub id: String,
    pub direction: TransportDirection,
    pub state: TransportState,
    pub ice_parameters: IceParameters,
    pub ice_candidates: IceCandidates,
    pub dtls_parameters: DtlsParameters,
}

impl LocalTransport {
    pub fn new(
        id: String,
        direction: TransportDirection,
        ice_parameters: IceParameters,
        ice_candidates: IceCandidates,
        dtls_parameters: DtlsParameters,
    ) -> Self {
        Self {
            id,
            direction,
            state: TransportState::Created,
            ice_parameters,
            ice_candidates,
            dtls_parameters,
        }
    }

    /// Mark the DTLS answer as sent. Only valid from `Created`.
    pub fn begin_connect(&mut self) {
        if self.state == TransportState::Created {
            self.state = TransportState::Connecting;
        }
    }

    /// Server confirmed the connection.
    pub fn mark_connected(&mut self) {
        self.state = TransportState::Connected;
    }

    pub fn is_connected(&self) -> bool {
        self.state == TransportState::Connected
    }
}
