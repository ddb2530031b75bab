//! Media engine adapter boundary.
//!
//! The signaling core never moves media itself - it orchestrates an external
//! media-routing engine through the narrow trait surface defined here:
//!
//! - [`MediaEngine`] - obtains a worker and creates routers
//! - [`MediaRouter`] - one routable media domain per room; intersects codec
//!   capabilities and decides consumability
//! - [`MediaTransport`] - a negotiated network path, send or receive
//! - [`MediaProducer`] / [`MediaConsumer`] - one media stream of one kind
//!
//! Negotiation parameters (ICE/DTLS/RTP blobs) pass through opaquely; this
//! crate fabricates or forwards them but never models their internals.
//!
//! # Worker death
//!
//! An engine worker dying is not locally recoverable - router state would be
//! inconsistent after an in-process restart. [`MediaEngine::died`] exposes a
//! cancellation token that fires on worker death; the hosting process is
//! expected to fail fast and let external supervision restart it.
//!
//! # Loopback engine
//!
//! [`loopback::LoopbackEngine`] is a real in-process implementation with
//! fabricated negotiation parameters and full object bookkeeping. It backs
//! development deployments of the signaling server and every test in the
//! workspace. Production deployments implement these traits over an actual
//! media stack.

pub mod engine;
pub mod loopback;

pub use engine::{
    default_media_codecs, EngineError, EngineSettings, MediaConsumer, MediaEngine, MediaProducer,
    MediaRouter, MediaTransport,
};
pub use loopback::{EngineStats, LoopbackEngine};
