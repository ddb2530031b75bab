//! Room registry.
//!
//! Owns all room and participant state behind one async mutex. Media engine
//! round trips never happen while the lock is held; methods that need both
//! release the lock around the engine call and re-validate afterwards.
//!
//! Ordering contract: any state mutation that a broadcast reports is applied
//! under the lock before the broadcast is sent, so a client that learns about
//! a peer (or a producer) can immediately act on it.

use crate::errors::ServerError;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use huddle_media::{MediaConsumer, MediaEngine, MediaProducer, MediaRouter, MediaTransport};
use huddle_protocol::{ParticipantSummary, ServerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

/// Handle to a room created through the HTTP API.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: String,
    pub room_name: String,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of a room for the HTTP API.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub room_name: String,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<ParticipantSummary>,
}

/// Result of registering a participant.
#[derive(Debug)]
pub struct JoinedRoom {
    /// Participant id (the connection id; stable across re-joins of the
    /// same connection).
    pub participant_id: String,
    /// False when the connection was already registered in the room.
    pub newly_added: bool,
    /// Full member list, including the joiner, captured atomically with the
    /// registration.
    pub participants: Vec<ParticipantSummary>,
}

struct Participant {
    name: String,
    events: mpsc::UnboundedSender<ServerEvent>,
    transports: HashMap<String, Arc<dyn MediaTransport>>,
    // Insertion order preserved so late-joiner backfill replays announcements
    // in production order.
    producers: Vec<Arc<dyn MediaProducer>>,
    consumers: HashMap<String, Arc<dyn MediaConsumer>>,
}

struct Room {
    name: String,
    created_at: DateTime<Utc>,
    router: Option<Arc<dyn MediaRouter>>,
    participants: HashMap<String, Participant>,
}

/// All live rooms, keyed by room id.
pub struct RoomRegistry {
    engine: Arc<dyn MediaEngine>,
    rooms: Mutex<HashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Create a room with a fresh id. The router is created lazily on first
    /// join, not here.
    pub async fn create_room(&self, name: &str) -> RoomInfo {
        let room_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let room = Room {
            name: name.to_string(),
            created_at,
            router: None,
            participants: HashMap::new(),
        };
        self.rooms.lock().await.insert(room_id.clone(), room);
        metrics::record_room_created();
        info!(
            target: "huddle.registry",
            room_id = %room_id,
            room_name = %name,
            "Room created"
        );
        RoomInfo {
            room_id,
            room_name: name.to_string(),
            created_at,
        }
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    pub async fn room_snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        let rooms = self.rooms.lock().await;
        let room = rooms.get(room_id)?;
        Some(RoomSnapshot {
            room_id: room_id.to_string(),
            room_name: room.name.clone(),
            created_at: room.created_at,
            participants: member_list(room),
        })
    }

    /// Register a connection as a room participant.
    ///
    /// Idempotent per connection id: re-registering an existing member
    /// refreshes nothing and reports `newly_added: false` so callers can
    /// skip the join broadcast.
    pub async fn add_participant(
        &self,
        room_id: &str,
        connection_id: &str,
        name: &str,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<JoinedRoom, ServerError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ServerError::RoomNotFound(room_id.to_string()))?;

        let newly_added = !room.participants.contains_key(connection_id);
        if newly_added {
            room.participants.insert(
                connection_id.to_string(),
                Participant {
                    name: name.to_string(),
                    events,
                    transports: HashMap::new(),
                    producers: Vec::new(),
                    consumers: HashMap::new(),
                },
            );
            metrics::record_participant_joined();
            info!(
                target: "huddle.registry",
                room_id = %room_id,
                participant_id = %connection_id,
                participant_name = %name,
                "Participant joined"
            );
        }

        Ok(JoinedRoom {
            participant_id: connection_id.to_string(),
            newly_added,
            participants: member_list(room),
        })
    }

    /// Get the room's router, creating it on first use.
    ///
    /// The engine round trip runs without the lock; if another caller won
    /// the race (or the room disappeared) in the meantime, the freshly
    /// created router is closed and the surviving one returned.
    pub async fn get_or_create_router(
        &self,
        room_id: &str,
    ) -> Result<Arc<dyn MediaRouter>, ServerError> {
        {
            let rooms = self.rooms.lock().await;
            let room = rooms
                .get(room_id)
                .ok_or_else(|| ServerError::RoomNotFound(room_id.to_string()))?;
            if let Some(router) = &room.router {
                return Ok(Arc::clone(router));
            }
        }

        let candidate = self.engine.create_router().await?;

        let loser: Option<Arc<dyn MediaRouter>>;
        let result = {
            let mut rooms = self.rooms.lock().await;
            match rooms.get_mut(room_id) {
                None => {
                    loser = Some(candidate);
                    Err(ServerError::RoomNotFound(room_id.to_string()))
                }
                Some(room) => {
                    if let Some(existing) = &room.router {
                        let existing = Arc::clone(existing);
                        loser = Some(candidate);
                        Ok(existing)
                    } else {
                        debug!(
                            target: "huddle.registry",
                            room_id = %room_id,
                            "Router bound to room"
                        );
                        room.router = Some(Arc::clone(&candidate));
                        loser = None;
                        Ok(candidate)
                    }
                }
            }
        };
        if let Some(router) = loser {
            router.close();
        }
        result
    }

    /// Remove a participant, tear down their media objects, and destroy the
    /// room if it empties. Idempotent; returns false when the participant
    /// was not registered.
    ///
    /// Teardown order: producers, consumers, transports, then the router if
    /// the room died. `Option::take` on the router under the lock guarantees
    /// at most one caller ever closes it.
    pub async fn remove_participant(&self, room_id: &str, connection_id: &str) -> bool {
        let (participant, router, peers) = {
            let mut rooms = self.rooms.lock().await;
            let Some(room) = rooms.get_mut(room_id) else {
                return false;
            };
            let Some(participant) = room.participants.remove(connection_id) else {
                return false;
            };
            if room.participants.is_empty() {
                let router = room.router.take();
                rooms.remove(room_id);
                (participant, router, Vec::new())
            } else {
                let peers: Vec<_> = room
                    .participants
                    .values()
                    .map(|p| p.events.clone())
                    .collect();
                (participant, None, peers)
            }
        };

        for producer in &participant.producers {
            producer.close();
        }
        for consumer in participant.consumers.values() {
            consumer.close();
        }
        for transport in participant.transports.values() {
            transport.close();
        }
        let room_destroyed = router.is_some();
        if let Some(router) = router {
            router.close();
            metrics::record_room_closed();
            info!(
                target: "huddle.registry",
                room_id = %room_id,
                "Last participant left, room destroyed"
            );
        }

        let event = ServerEvent::ParticipantLeft {
            participant_id: connection_id.to_string(),
        };
        for peer in peers {
            // Peer's writer may already be gone; drop silently.
            let _ = peer.send(event.clone());
        }

        metrics::record_participant_left();
        debug!(
            target: "huddle.registry",
            room_id = %room_id,
            participant_id = %connection_id,
            room_destroyed,
            "Participant removed"
        );
        true
    }

    /// Send an event to every member except `exclude`.
    ///
    /// Senders are collected under the lock and the sends happen after
    /// release.
    pub async fn broadcast_except(&self, room_id: &str, exclude: &str, event: ServerEvent) {
        let peers: Vec<_> = {
            let rooms = self.rooms.lock().await;
            let Some(room) = rooms.get(room_id) else {
                return;
            };
            room.participants
                .iter()
                .filter(|(id, _)| id.as_str() != exclude)
                .map(|(_, p)| p.events.clone())
                .collect()
        };
        for peer in peers {
            let _ = peer.send(event.clone());
        }
    }

    /// Synthetic `new-producer` events for every producer that predates a
    /// joiner, captured atomically.
    pub async fn producer_backfill(&self, room_id: &str, exclude: &str) -> Vec<ServerEvent> {
        let rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(room_id) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for (participant_id, participant) in &room.participants {
            if participant_id == exclude {
                continue;
            }
            for producer in &participant.producers {
                events.push(ServerEvent::NewProducer {
                    producer_id: producer.id().to_string(),
                    participant_id: participant_id.clone(),
                    kind: producer.kind(),
                });
            }
        }
        events
    }

    /// Attach a transport to a participant. Fails if the participant left
    /// between creation and insertion; the caller must close the transport
    /// in that case.
    pub async fn insert_transport(
        &self,
        room_id: &str,
        connection_id: &str,
        transport: Arc<dyn MediaTransport>,
    ) -> Result<(), ServerError> {
        let mut rooms = self.rooms.lock().await;
        let participant = participant_mut(&mut rooms, room_id, connection_id)?;
        participant
            .transports
            .insert(transport.id().to_string(), transport);
        Ok(())
    }

    /// Look up a transport owned by this participant. Transport ids of other
    /// participants are invisible here.
    pub async fn transport(
        &self,
        room_id: &str,
        connection_id: &str,
        transport_id: &str,
    ) -> Result<Arc<dyn MediaTransport>, ServerError> {
        let mut rooms = self.rooms.lock().await;
        let participant = participant_mut(&mut rooms, room_id, connection_id)?;
        participant
            .transports
            .get(transport_id)
            .cloned()
            .ok_or_else(|| ServerError::TransportNotFound(transport_id.to_string()))
    }

    /// Attach a producer to a participant and snapshot the peers that should
    /// hear its announcement.
    ///
    /// Insertion and peer collection happen under one lock acquisition, so a
    /// connection joining afterwards discovers the producer through backfill
    /// and is never also in the returned broadcast set.
    pub async fn insert_producer_and_peers(
        &self,
        room_id: &str,
        connection_id: &str,
        producer: Arc<dyn MediaProducer>,
    ) -> Result<Vec<mpsc::UnboundedSender<ServerEvent>>, ServerError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .get_mut(room_id)
            .ok_or_else(|| ServerError::RoomNotFound(room_id.to_string()))?;
        let peers: Vec<_> = room
            .participants
            .iter()
            .filter(|(id, _)| id.as_str() != connection_id)
            .map(|(_, p)| p.events.clone())
            .collect();
        let participant = room
            .participants
            .get_mut(connection_id)
            .ok_or_else(|| ServerError::ParticipantNotFound(connection_id.to_string()))?;
        participant.producers.push(producer);
        Ok(peers)
    }

    pub async fn insert_consumer(
        &self,
        room_id: &str,
        connection_id: &str,
        consumer: Arc<dyn MediaConsumer>,
    ) -> Result<(), ServerError> {
        let mut rooms = self.rooms.lock().await;
        let participant = participant_mut(&mut rooms, room_id, connection_id)?;
        participant
            .consumers
            .insert(consumer.id().to_string(), consumer);
        Ok(())
    }

    /// Look up a consumer owned by this participant.
    pub async fn consumer(
        &self,
        room_id: &str,
        connection_id: &str,
        consumer_id: &str,
    ) -> Result<Arc<dyn MediaConsumer>, ServerError> {
        let mut rooms = self.rooms.lock().await;
        let participant = participant_mut(&mut rooms, room_id, connection_id)?;
        participant
            .consumers
            .get(consumer_id)
            .cloned()
            .ok_or_else(|| ServerError::ConsumerNotFound(consumer_id.to_string()))
    }
}

fn member_list(room: &Room) -> Vec<ParticipantSummary> {
    room.participants
        .iter()
        .map(|(id, p)| ParticipantSummary {
            id: id.clone(),
            name: p.name.clone(),
        })
        .collect()
}

fn participant_mut<'a>(
    rooms: &'a mut tokio::sync::MutexGuard<'_, HashMap<String, Room>>,
    room_id: &str,
    connection_id: &str,
) -> Result<&'a mut Participant, ServerError> {
    let room = rooms
        .get_mut(room_id)
        .ok_or_else(|| ServerError::RoomNotFound(room_id.to_string()))?;
    room.participants
        .get_mut(connection_id)
        .ok_or_else(|| ServerError::ParticipantNotFound(connection_id.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use huddle_media::LoopbackEngine;
    use huddle_protocol::{MediaKind, RtpParameters};
    use serde_json::json;

    fn registry() -> (Arc<RoomRegistry>, Arc<huddle_media::EngineStats>) {
        let engine = Arc::new(LoopbackEngine::default());
        let stats = engine.stats();
        (Arc::new(RoomRegistry::new(engine)), stats)
    }

    fn event_channel() -> mpsc::UnboundedSender<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Keep the receiver alive for the duration of the test.
        std::mem::forget(rx);
        tx
    }

    #[tokio::test]
    async fn add_participant_is_idempotent_per_connection() {
        let (registry, _) = registry();
        let room = registry.create_room("standup").await;

        let first = registry
            .add_participant(&room.room_id, "conn-1", "Alice", event_channel())
            .await
            .unwrap();
        assert!(first.newly_added);
        assert_eq!(first.participants.len(), 1);

        let second = registry
            .add_participant(&room.room_id, "conn-1", "Alice", event_channel())
            .await
            .unwrap();
        assert!(!second.newly_added);
        assert_eq!(second.participants.len(), 1);
        assert_eq!(second.participant_id, first.participant_id);
    }

    #[tokio::test]
    async fn add_participant_to_missing_room_fails() {
        let (registry, _) = registry();
        let result = registry
            .add_participant("no-such-room", "conn-1", "Alice", event_channel())
            .await;
        assert!(matches!(result, Err(ServerError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn empty_room_is_destroyed_and_router_closed_once() {
        let (registry, stats) = registry();
        let room = registry.create_room("standup").await;
        registry
            .add_participant(&room.room_id, "conn-1", "Alice", event_channel())
            .await
            .unwrap();
        registry.get_or_create_router(&room.room_id).await.unwrap();

        assert!(registry.remove_participant(&room.room_id, "conn-1").await);
        assert!(!registry.room_exists(&room.room_id).await);
        assert_eq!(stats.routers_closed(), 1);

        // Second removal is a no-op and must not double-close.
        assert!(!registry.remove_participant(&room.room_id, "conn-1").await);
        assert_eq!(stats.routers_closed(), 1);
    }

    #[tokio::test]
    async fn router_is_created_once_per_room() {
        let (registry, stats) = registry();
        let room = registry.create_room("standup").await;

        let first = registry.get_or_create_router(&room.room_id).await.unwrap();
        let second = registry.get_or_create_router(&room.room_id).await.unwrap();

        assert_eq!(first.rtp_capabilities(), second.rtp_capabilities());
        assert_eq!(stats.routers_created(), 1);
    }

    #[tokio::test]
    async fn transport_lookup_is_scoped_to_owner() {
        let (registry, _) = registry();
        let room = registry.create_room("standup").await;
        registry
            .add_participant(&room.room_id, "conn-1", "Alice", event_channel())
            .await
            .unwrap();
        registry
            .add_participant(&room.room_id, "conn-2", "Bob", event_channel())
            .await
            .unwrap();
        let router = registry.get_or_create_router(&room.room_id).await.unwrap();
        let transport = router.create_transport().await.unwrap();
        let transport_id = transport.id().to_string();
        registry
            .insert_transport(&room.room_id, "conn-1", transport)
            .await
            .unwrap();

        assert!(registry
            .transport(&room.room_id, "conn-1", &transport_id)
            .await
            .is_ok());
        let cross = registry
            .transport(&room.room_id, "conn-2", &transport_id)
            .await;
        assert!(matches!(cross, Err(ServerError::TransportNotFound(_))));
    }

    #[tokio::test]
    async fn backfill_lists_peer_producers_only() {
        let (registry, _) = registry();
        let room = registry.create_room("standup").await;
        registry
            .add_participant(&room.room_id, "conn-1", "Alice", event_channel())
            .await
            .unwrap();
        let router = registry.get_or_create_router(&room.room_id).await.unwrap();
        let transport = router.create_transport().await.unwrap();
        let producer = transport
            .produce(MediaKind::Audio, RtpParameters(json!({"codecs": []})))
            .await
            .unwrap();
        registry
            .insert_producer_and_peers(&room.room_id, "conn-1", producer)
            .await
            .unwrap();

        let for_self = registry.producer_backfill(&room.room_id, "conn-1").await;
        assert!(for_self.is_empty());

        let for_joiner = registry.producer_backfill(&room.room_id, "conn-2").await;
        assert_eq!(for_joiner.len(), 1);
        assert!(matches!(
            &for_joiner[0],
            ServerEvent::NewProducer { participant_id, kind, .. }
                if participant_id == "conn-1" && *kind == MediaKind::Audio
        ));
    }

    #[tokio::test]
    async fn producer_insertion_snapshots_announcement_targets() {
        let (registry, _) = registry();
        let room = registry.create_room("standup").await;
        registry
            .add_participant(&room.room_id, "conn-1", "Alice", event_channel())
            .await
            .unwrap();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        registry
            .add_participant(&room.room_id, "conn-2", "Bob", bob_tx)
            .await
            .unwrap();
        let router = registry.get_or_create_router(&room.room_id).await.unwrap();
        let transport = router.create_transport().await.unwrap();
        let producer = transport
            .produce(MediaKind::Video, RtpParameters(json!({"codecs": []})))
            .await
            .unwrap();

        let peers = registry
            .insert_producer_and_peers(&room.room_id, "conn-1", producer)
            .await
            .unwrap();

        // The owner is excluded and the set is captured with the insertion:
        // a later joiner sees the producer in backfill, not here.
        assert_eq!(peers.len(), 1);
        peers[0]
            .send(ServerEvent::ParticipantLeft {
                participant_id: "conn-1".to_string(),
            })
            .unwrap();
        assert!(bob_rx.recv().await.is_some());

        let late = registry.producer_backfill(&room.room_id, "conn-3").await;
        assert_eq!(late.len(), 1);
    }

    #[tokio::test]
    async fn remove_notifies_remaining_peers() {
        let (registry, _) = registry();
        let room = registry.create_room("standup").await;
        registry
            .add_participant(&room.room_id, "conn-1", "Alice", event_channel())
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .add_participant(&room.room_id, "conn-2", "Bob", tx)
            .await
            .unwrap();

        registry.remove_participant(&room.room_id, "conn-1").await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            ServerEvent::ParticipantLeft { participant_id } if participant_id == "conn-1"
        ));
        assert!(registry.room_exists(&room.room_id).await);
    }
}
