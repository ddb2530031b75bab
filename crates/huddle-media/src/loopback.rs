//! In-process loopback engine.
//!
//! Implements the full adapter surface with fabricated negotiation
//! parameters and real object bookkeeping: producers registered on the
//! router, consumers created paused, idempotent closes, and per-class
//! create/close counters. No media flows.
//!
//! The signaling server binary runs against this engine in development;
//! the workspace test suites use it as the engine double.

use crate::engine::{
    default_media_codecs, EngineError, EngineSettings, MediaConsumer, MediaEngine, MediaProducer,
    MediaRouter, MediaTransport,
};
use async_trait::async_trait;
use huddle_protocol::{
    DtlsParameters, IceCandidates, IceParameters, MediaKind, RtpCapabilities, RtpParameters,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Create/close counters per engine object class.
///
/// Closes are counted once per object regardless of how many times `close`
/// is called, which is what teardown-idempotence tests assert against.
#[derive(Debug, Default)]
pub struct EngineStats {
    routers_created: AtomicU64,
    routers_closed: AtomicU64,
    transports_created: AtomicU64,
    transports_closed: AtomicU64,
    producers_created: AtomicU64,
    producers_closed: AtomicU64,
    consumers_created: AtomicU64,
    consumers_closed: AtomicU64,
}

macro_rules! stat_accessors {
    ($($name:ident),+ $(,)?) => {
        $(
            #[must_use]
            pub fn $name(&self) -> u64 {
                self.$name.load(Ordering::SeqCst)
            }
        )+
    };
}

impl EngineStats {
    stat_accessors!(
        routers_created,
        routers_closed,
        transports_created,
        transports_closed,
        producers_created,
        producers_closed,
        consumers_created,
        consumers_closed,
    );
}

/// Lock a std mutex, recovering from poisoning.
fn lock_map<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// The in-process engine.
pub struct LoopbackEngine {
    died: CancellationToken,
    stats: Arc<EngineStats>,
}

impl LoopbackEngine {
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        debug!(
            target: "huddle.media.loopback",
            announced_ip = settings.announced_ip.as_deref().unwrap_or("-"),
            rtc_min_port = settings.rtc_min_port,
            rtc_max_port = settings.rtc_max_port,
            "Loopback engine initialized"
        );
        Self {
            died: CancellationToken::new(),
            stats: Arc::new(EngineStats::default()),
        }
    }

    /// Shared create/close counters.
    #[must_use]
    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Simulate the media worker dying. Fires the `died` token.
    pub fn kill_worker(&self) {
        self.died.cancel();
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

#[async_trait]
impl MediaEngine for LoopbackEngine {
    async fn create_router(&self) -> Result<Arc<dyn MediaRouter>, EngineError> {
        if self.died.is_cancelled() {
            return Err(EngineError::Failure("media worker has died".to_string()));
        }
        self.stats.routers_created.fetch_add(1, Ordering::SeqCst);
        let router = LoopbackRouter {
            id: Uuid::new_v4().to_string(),
            capabilities: json!({
                "codecs": default_media_codecs(),
                "headerExtensions": [],
            }),
            shared: Arc::new(RouterShared {
                producers: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                stats: Arc::clone(&self.stats),
            }),
        };
        debug!(target: "huddle.media.loopback", router_id = %router.id, "Router created");
        Ok(Arc::new(router))
    }

    fn died(&self) -> CancellationToken {
        self.died.clone()
    }
}

/// Producer registry shared between a router and its transports.
struct RouterShared {
    producers: Mutex<HashMap<String, MediaKind>>,
    closed: AtomicBool,
    stats: Arc<EngineStats>,
}

struct LoopbackRouter {
    id: String,
    capabilities: serde_json::Value,
    shared: Arc<RouterShared>,
}

/// Capability-intersection check: the consuming side must list at least one
/// codec of the producer's kind.
fn capabilities_support_kind(rtp_capabilities: &RtpCapabilities, kind: MediaKind) -> bool {
    rtp_capabilities
        .0
        .get("codecs")
        .and_then(serde_json::Value::as_array)
        .is_some_and(|codecs| {
            codecs.iter().any(|codec| {
                codec.get("kind").and_then(serde_json::Value::as_str) == Some(kind.as_str())
            })
        })
}

#[async_trait]
impl MediaRouter for LoopbackRouter {
    fn rtp_capabilities(&self) -> RtpCapabilities {
        RtpCapabilities(self.capabilities.clone())
    }

    async fn create_transport(&self) -> Result<Arc<dyn MediaTransport>, EngineError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        self.shared
            .stats
            .transports_created
            .fetch_add(1, Ordering::SeqCst);
        let id = Uuid::new_v4().to_string();
        let transport = LoopbackTransport {
            ice_parameters: json!({
                "usernameFragment": Uuid::new_v4().to_string(),
                "password": Uuid::new_v4().to_string(),
                "iceLite": true,
            }),
            ice_candidates: json!([{
                "foundation": "udpcandidate",
                "priority": 1_076_302_079_u64,
                "ip": "127.0.0.1",
                "protocol": "udp",
                "port": 40_000,
                "type": "host",
            }]),
            dtls_parameters: json!({
                "role": "auto",
                "fingerprints": [{
                    "algorithm": "sha-256",
                    "value": Uuid::new_v4().to_string(),
                }],
            }),
            id,
            router: Arc::clone(&self.shared),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        debug!(target: "huddle.media.loopback", transport_id = %transport.id, "Transport created");
        Ok(Arc::new(transport))
    }

    async fn can_consume(&self, producer_id: &str, rtp_capabilities: &RtpCapabilities) -> bool {
        let kind = lock_map(&self.shared.producers).get(producer_id).copied();
        match kind {
            Some(kind) => capabilities_support_kind(rtp_capabilities, kind),
            None => false,
        }
    }

    fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.stats.routers_closed.fetch_add(1, Ordering::SeqCst);
            debug!(target: "huddle.media.loopback", router_id = %self.id, "Router closed");
        }
    }
}

struct LoopbackTransport {
    id: String,
    router: Arc<RouterShared>,
    ice_parameters: serde_json::Value,
    ice_candidates: serde_json::Value,
    dtls_parameters: serde_json::Value,
    connected: AtomicBool,
    closed: AtomicBool,
}

#[async_trait]
impl MediaTransport for LoopbackTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn ice_parameters(&self) -> IceParameters {
        IceParameters(self.ice_parameters.clone())
    }

    fn ice_candidates(&self) -> IceCandidates {
        IceCandidates(self.ice_candidates.clone())
    }

    fn dtls_parameters(&self) -> DtlsParameters {
        DtlsParameters(self.dtls_parameters.clone())
    }

    async fn connect(&self, dtls_parameters: DtlsParameters) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        if !dtls_parameters.is_present() {
            return Err(EngineError::Failure("missing dtlsParameters".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<Arc<dyn MediaProducer>, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        if !rtp_parameters.is_present() {
            return Err(EngineError::Failure("missing rtpParameters".to_string()));
        }
        let id = Uuid::new_v4().to_string();
        lock_map(&self.router.producers).insert(id.clone(), kind);
        self.router
            .stats
            .producers_created
            .fetch_add(1, Ordering::SeqCst);
        debug!(target: "huddle.media.loopback", producer_id = %id, kind = %kind, "Producer created");
        Ok(Arc::new(LoopbackProducer {
            id,
            kind,
            router: Arc::clone(&self.router),
            closed: AtomicBool::new(false),
        }))
    }

    async fn consume(
        &self,
        producer_id: &str,
        rtp_capabilities: RtpCapabilities,
        paused: bool,
    ) -> Result<Arc<dyn MediaConsumer>, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        let kind = lock_map(&self.router.producers)
            .get(producer_id)
            .copied()
            .ok_or_else(|| EngineError::UnknownProducer(producer_id.to_string()))?;
        if !capabilities_support_kind(&rtp_capabilities, kind) {
            return Err(EngineError::Failure(format!(
                "capabilities cannot consume {kind} producer"
            )));
        }
        self.router
            .stats
            .consumers_created
            .fetch_add(1, Ordering::SeqCst);
        let consumer = LoopbackConsumer {
            id: Uuid::new_v4().to_string(),
            producer_id: producer_id.to_string(),
            kind,
            rtp_parameters: json!({
                "codecs": [{"kind": kind.as_str(), "payloadType": 100}],
                "rtcp": {"cname": Uuid::new_v4().to_string()},
            }),
            paused: AtomicBool::new(paused),
            closed: AtomicBool::new(false),
            stats: Arc::clone(&self.router.stats),
        };
        debug!(
            target: "huddle.media.loopback",
            consumer_id = %consumer.id,
            producer_id = %producer_id,
            paused,
            "Consumer created"
        );
        Ok(Arc::new(consumer))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.router
                .stats
                .transports_closed
                .fetch_add(1, Ordering::SeqCst);
            debug!(target: "huddle.media.loopback", transport_id = %self.id, "Transport closed");
        }
    }
}

struct LoopbackProducer {
    id: String,
    kind: MediaKind,
    router: Arc<RouterShared>,
    closed: AtomicBool,
}

impl MediaProducer for LoopbackProducer {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            lock_map(&self.router.producers).remove(&self.id);
            self.router
                .stats
                .producers_closed
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct LoopbackConsumer {
    id: String,
    producer_id: String,
    kind: MediaKind,
    rtp_parameters: serde_json::Value,
    paused: AtomicBool,
    closed: AtomicBool,
    stats: Arc<EngineStats>,
}

#[async_trait]
impl MediaConsumer for LoopbackConsumer {
    fn id(&self) -> &str {
        &self.id
    }

    fn producer_id(&self) -> &str {
        &self.producer_id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn rtp_parameters(&self) -> RtpParameters {
        RtpParameters(self.rtp_parameters.clone())
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.consumers_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn consumable_capabilities() -> RtpCapabilities {
        RtpCapabilities(json!({
            "codecs": [
                {"kind": "audio", "mimeType": "audio/opus"},
                {"kind": "video", "mimeType": "video/VP8"},
            ],
        }))
    }

    fn audio_only_capabilities() -> RtpCapabilities {
        RtpCapabilities(json!({
            "codecs": [{"kind": "audio", "mimeType": "audio/opus"}],
        }))
    }

    #[tokio::test]
    async fn router_capabilities_list_fixed_codecs() {
        let engine = LoopbackEngine::default();
        let router = engine.create_router().await.unwrap();
        let caps = router.rtp_capabilities();
        let codecs = caps.0.get("codecs").and_then(|c| c.as_array()).unwrap();
        assert_eq!(codecs.len(), 4);
    }

    #[tokio::test]
    async fn consumers_start_paused() {
        let engine = LoopbackEngine::default();
        let router = engine.create_router().await.unwrap();
        let transport = router.create_transport().await.unwrap();
        let producer = transport
            .produce(MediaKind::Video, RtpParameters(json!({"codecs": []})))
            .await
            .unwrap();

        let consumer = transport
            .consume(producer.id(), consumable_capabilities(), true)
            .await
            .unwrap();

        assert!(consumer.paused());
        consumer.resume().await.unwrap();
        assert!(!consumer.paused());
    }

    #[tokio::test]
    async fn can_consume_checks_capability_intersection() {
        let engine = LoopbackEngine::default();
        let router = engine.create_router().await.unwrap();
        let transport = router.create_transport().await.unwrap();
        let producer = transport
            .produce(MediaKind::Video, RtpParameters(json!({"codecs": []})))
            .await
            .unwrap();

        assert!(router.can_consume(producer.id(), &consumable_capabilities()).await);
        assert!(!router.can_consume(producer.id(), &audio_only_capabilities()).await);
        assert!(!router.can_consume("no-such-producer", &consumable_capabilities()).await);
    }

    #[tokio::test]
    async fn incompatible_consume_creates_no_consumer() {
        let engine = LoopbackEngine::default();
        let stats = engine.stats();
        let router = engine.create_router().await.unwrap();
        let transport = router.create_transport().await.unwrap();
        let producer = transport
            .produce(MediaKind::Video, RtpParameters(json!({"codecs": []})))
            .await
            .unwrap();

        let result = transport
            .consume(producer.id(), audio_only_capabilities(), true)
            .await;
        assert!(result.is_err());
        assert_eq!(stats.consumers_created(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_counted_once() {
        let engine = LoopbackEngine::default();
        let stats = engine.stats();
        let router = engine.create_router().await.unwrap();
        let transport = router.create_transport().await.unwrap();

        transport.close();
        transport.close();
        router.close();
        router.close();

        assert_eq!(stats.transports_closed(), 1);
        assert_eq!(stats.routers_closed(), 1);
    }

    #[tokio::test]
    async fn closed_producer_is_deregistered_from_router() {
        let engine = LoopbackEngine::default();
        let router = engine.create_router().await.unwrap();
        let transport = router.create_transport().await.unwrap();
        let producer = transport
            .produce(MediaKind::Audio, RtpParameters(json!({"codecs": []})))
            .await
            .unwrap();
        let producer_id = producer.id().to_string();

        producer.close();

        assert!(!router.can_consume(&producer_id, &consumable_capabilities()).await);
        let result = transport
            .consume(&producer_id, consumable_capabilities(), true)
            .await;
        assert!(matches!(result, Err(EngineError::UnknownProducer(_))));
    }

    #[tokio::test]
    async fn dead_worker_rejects_router_creation() {
        let engine = LoopbackEngine::default();
        engine.kill_worker();
        assert!(engine.died().is_cancelled());
        assert!(engine.create_router().await.is_err());
    }

    #[tokio::test]
    async fn connect_requires_dtls_parameters() {
        let engine = LoopbackEngine::default();
        let router = engine.create_router().await.unwrap();
        let transport = router.create_transport().await.unwrap();

        let missing = transport.connect(DtlsParameters(serde_json::Value::Null)).await;
        assert!(missing.is_err());

        transport
            .connect(DtlsParameters(json!({"role": "client", "fingerprints": []})))
            .await
            .unwrap();
    }
}
