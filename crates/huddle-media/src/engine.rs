//! Engine trait surface and shared engine types.

use async_trait::async_trait;
use huddle_protocol::{
    DtlsParameters, IceCandidates, IceParameters, MediaKind, RtpCapabilities, RtpParameters,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Media engine failure.
///
/// Protocol-level handlers wrap this as an engine failure and report a
/// generic error event to the originating client; internal detail stays in
/// server-side logs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The target object (router/transport/producer/consumer) is closed.
    #[error("object is closed")]
    Closed,

    /// Referenced producer does not exist on the router.
    #[error("unknown producer: {0}")]
    UnknownProducer(String),

    /// Any other engine-side failure.
    #[error("engine failure: {0}")]
    Failure(String),
}

/// Settings consumed by engine implementations.
///
/// The announced IP and RTC port range only matter to adapters backed by a
/// real media stack; the loopback engine ignores them.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Publicly announced IP for ICE candidates.
    pub announced_ip: Option<String>,
    /// Lower bound of the RTC port range.
    pub rtc_min_port: u16,
    /// Upper bound of the RTC port range.
    pub rtc_max_port: u16,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            announced_ip: None,
            rtc_min_port: 40_000,
            rtc_max_port: 49_999,
        }
    }
}

/// Fixed codec set every room router is created with.
///
/// Opus audio plus VP8/VP9/H.264 video. The signaling core treats the result
/// as opaque; only engine implementations interpret it.
#[must_use]
pub fn default_media_codecs() -> serde_json::Value {
    json!([
        {
            "kind": "audio",
            "mimeType": "audio/opus",
            "clockRate": 48_000,
            "channels": 2,
        },
        {
            "kind": "video",
            "mimeType": "video/VP8",
            "clockRate": 90_000,
            "parameters": {"x-google-start-bitrate": 1000},
        },
        {
            "kind": "video",
            "mimeType": "video/VP9",
            "clockRate": 90_000,
            "parameters": {"profile-id": 2, "x-google-start-bitrate": 1000},
        },
        {
            "kind": "video",
            "mimeType": "video/h264",
            "clockRate": 90_000,
            "parameters": {
                "packetization-mode": 1,
                "profile-level-id": "4d0032",
                "level-asymmetry-allowed": 1,
                "x-google-start-bitrate": 1000,
            },
        },
    ])
}

/// Entry point into the media engine: worker ownership and router creation.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a routable media domain with the fixed codec set.
    async fn create_router(&self) -> Result<Arc<dyn MediaRouter>, EngineError>;

    /// Token that fires if the underlying media worker dies.
    ///
    /// Worker death is fatal for the process; callers select on this and
    /// fail fast rather than attempting in-process recovery.
    fn died(&self) -> CancellationToken;
}

/// One routable media domain, shared by all participants of one room.
#[async_trait]
pub trait MediaRouter: Send + Sync {
    /// Capability description to hand to joining clients.
    fn rtp_capabilities(&self) -> RtpCapabilities;

    /// Create a negotiable transport on this router.
    async fn create_transport(&self) -> Result<Arc<dyn MediaTransport>, EngineError>;

    /// Whether `rtp_capabilities` can consume the given producer
    /// (capability-intersection check).
    async fn can_consume(&self, producer_id: &str, rtp_capabilities: &RtpCapabilities) -> bool;

    /// Close the router. Idempotent.
    fn close(&self);
}

/// A negotiated network path owned by exactly one participant.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    fn id(&self) -> &str;
    fn ice_parameters(&self) -> IceParameters;
    fn ice_candidates(&self) -> IceCandidates;
    fn dtls_parameters(&self) -> DtlsParameters;

    /// Complete DTLS negotiation with the remote side's parameters.
    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<(), EngineError>;

    /// Create a producer for an incoming media stream.
    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Arc<dyn MediaProducer>, EngineError>;

    /// Create a consumer for the given producer.
    ///
    /// Callers are expected to gate this behind
    /// [`MediaRouter::can_consume`]; the signaling protocol always passes
    /// `paused: true`.
    async fn consume(
        &self,
        producer_id: &str,
        rtp_capabilities: RtpCapabilities,
        paused: bool,
    ) -> Result<Arc<dyn MediaConsumer>, EngineError>;

    /// Close the transport and everything carried on it. Idempotent.
    fn close(&self);
}

/// An outgoing media stream of one kind.
pub trait MediaProducer: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    /// Close the producer. Idempotent.
    fn close(&self);
}

/// An incoming view of another participant's producer.
#[async_trait]
pub trait MediaConsumer: Send + Sync {
    fn id(&self) -> &str;
    fn producer_id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn rtp_parameters(&self) -> RtpParameters;
    fn paused(&self) -> bool;

    /// Start media flow. Consumers are created paused and only run after an
    /// explicit resume from the consuming client.
    async fn resume(&self) -> Result<(), EngineError>;

    /// Close the consumer. Idempotent.
    fn close(&self);
}
