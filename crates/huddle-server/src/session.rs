//! Per-connection session protocol handler.
//!
//! One `SessionHandler` exists per signaling connection. Messages from the
//! connection are handled strictly in arrival order; outbound events go
//! through the connection's unbounded event channel, which a writer task
//! drains onto the socket.
//!
//! Every protocol failure is reported as an `error` event on the
//! originating connection only, carrying the client-safe message. Peers are
//! never told about another connection's failures.

use crate::errors::ServerError;
use crate::observability::metrics;
use crate::registry::RoomRegistry;
use huddle_media::MediaRouter;
use huddle_protocol::{
    ClientMessage, DtlsParameters, MediaKind, ParticipantSummary, RtpCapabilities, RtpParameters,
    ServerEvent, TransportDirection,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Current room binding of a connection.
struct Membership {
    room_id: String,
    participant_id: String,
    router: Arc<dyn MediaRouter>,
}

/// Protocol state machine for one signaling connection.
pub struct SessionHandler {
    connection_id: String,
    registry: Arc<RoomRegistry>,
    events: mpsc::UnboundedSender<ServerEvent>,
    membership: Option<Membership>,
}

impl SessionHandler {
    pub fn new(
        connection_id: String,
        registry: Arc<RoomRegistry>,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            connection_id,
            registry,
            events,
            membership: None,
        }
    }

    /// Handle one inbound message. Failures become an `error` event on this
    /// connection; the handler itself never gives up on the connection.
    pub async fn handle(&mut self, message: ClientMessage) {
        let result = match message {
            ClientMessage::JoinRoom {
                room_id,
                participant_name,
            } => self.join_room(room_id, participant_name).await,
            ClientMessage::GetRtpCapabilities => self.send_rtp_capabilities(),
            ClientMessage::CreateTransport { direction } => {
                self.create_transport(direction).await
            }
            ClientMessage::ConnectTransport {
                transport_id,
                dtls_parameters,
            } => self.connect_transport(transport_id, dtls_parameters).await,
            ClientMessage::Produce {
                transport_id,
                kind,
                rtp_parameters,
            } => self.produce(transport_id, kind, rtp_parameters).await,
            ClientMessage::Consume {
                transport_id,
                producer_id,
                rtp_capabilities,
            } => {
                self.consume(transport_id, producer_id, rtp_capabilities)
                    .await
            }
            ClientMessage::ResumeConsumer { consumer_id } => {
                self.resume_consumer(consumer_id).await
            }
            ClientMessage::LeaveRoom => {
                self.leave_current_room().await;
                Ok(())
            }
        };

        if let Err(error) = result {
            metrics::record_signal_error(error.metric_kind());
            warn!(
                target: "huddle.session",
                connection_id = %self.connection_id,
                error = %error,
                "Signaling request failed"
            );
            self.send(ServerEvent::Error {
                message: error.client_message(),
            });
        }
    }

    /// The connection dropped without a `leave-room`; run the same teardown.
    pub async fn disconnected(&mut self) {
        debug!(
            target: "huddle.session",
            connection_id = %self.connection_id,
            in_room = self.membership.is_some(),
            "Connection closed"
        );
        self.leave_current_room().await;
    }

    async fn join_room(
        &mut self,
        room_id: String,
        participant_name: String,
    ) -> Result<(), ServerError> {
        let switching_rooms = self
            .membership
            .as_ref()
            .is_some_and(|m| m.room_id != room_id);
        if switching_rooms {
            // Implicit leave before joining a different room.
            self.leave_current_room().await;
        }

        // Router first: if the engine fails, the participant is never
        // registered and no peer ever hears about the aborted join.
        let router = self.registry.get_or_create_router(&room_id).await?;

        let joined = self
            .registry
            .add_participant(
                &room_id,
                &self.connection_id,
                &participant_name,
                self.events.clone(),
            )
            .await?;

        self.membership = Some(Membership {
            room_id: room_id.clone(),
            participant_id: joined.participant_id.clone(),
            router: Arc::clone(&router),
        });

        self.send(ServerEvent::RtpCapabilities {
            rtp_capabilities: router.rtp_capabilities(),
        });
        self.send(ServerEvent::RoomJoined {
            room_id: room_id.clone(),
            participant_id: joined.participant_id.clone(),
            participants: joined.participants,
        });

        if joined.newly_added {
            self.registry
                .broadcast_except(
                    &room_id,
                    &self.connection_id,
                    ServerEvent::ParticipantJoined {
                        participant: ParticipantSummary {
                            id: joined.participant_id,
                            name: participant_name,
                        },
                    },
                )
                .await;

            // Late-joiner backfill: replay existing producers as synthetic
            // announcements, after room-joined so the client already knows
            // the owning participants.
            for event in self
                .registry
                .producer_backfill(&room_id, &self.connection_id)
                .await
            {
                self.send(event);
            }
        }

        Ok(())
    }

    fn send_rtp_capabilities(&self) -> Result<(), ServerError> {
        let membership = self.membership.as_ref().ok_or(ServerError::NoRouter)?;
        self.send(ServerEvent::RtpCapabilities {
            rtp_capabilities: membership.router.rtp_capabilities(),
        });
        Ok(())
    }

    async fn create_transport(&self, direction: TransportDirection) -> Result<(), ServerError> {
        let membership = self.membership.as_ref().ok_or(ServerError::NotInRoom)?;

        let transport = membership.router.create_transport().await?;
        let created = ServerEvent::TransportCreated {
            id: transport.id().to_string(),
            ice_parameters: transport.ice_parameters(),
            ice_candidates: transport.ice_candidates(),
            dtls_parameters: transport.dtls_parameters(),
            direction,
        };

        if let Err(error) = self
            .registry
            .insert_transport(
                &membership.room_id,
                &self.connection_id,
                Arc::clone(&transport),
            )
            .await
        {
            // Participant vanished between creation and insertion.
            transport.close();
            return Err(error);
        }

        debug!(
            target: "huddle.session",
            connection_id = %self.connection_id,
            transport_id = %transport.id(),
            direction = %direction,
            "Transport created"
        );
        self.send(created);
        Ok(())
    }

    async fn connect_transport(
        &self,
        transport_id: String,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), ServerError> {
        let membership = self.membership.as_ref().ok_or(ServerError::NotInRoom)?;
        let transport = self
            .registry
            .transport(&membership.room_id, &self.connection_id, &transport_id)
            .await?;

        transport.connect(dtls_parameters).await?;

        self.send(ServerEvent::TransportConnected { transport_id });
        Ok(())
    }

    async fn produce(
        &self,
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<(), ServerError> {
        let membership = self.membership.as_ref().ok_or(ServerError::NotInRoom)?;
        let transport = self
            .registry
            .transport(&membership.room_id, &self.connection_id, &transport_id)
            .await?;

        let producer = transport.produce(kind, rtp_parameters).await?;
        let producer_id = producer.id().to_string();

        // Insertion and peer snapshot share one lock acquisition: a peer
        // either predates the producer and gets this announcement, or joins
        // later and gets the backfill, never both.
        let peers = match self
            .registry
            .insert_producer_and_peers(
                &membership.room_id,
                &self.connection_id,
                Arc::clone(&producer),
            )
            .await
        {
            Ok(peers) => peers,
            Err(error) => {
                producer.close();
                return Err(error);
            }
        };

        debug!(
            target: "huddle.session",
            connection_id = %self.connection_id,
            producer_id = %producer_id,
            kind = %kind,
            "Producer created"
        );
        self.send(ServerEvent::ProducerCreated {
            id: producer_id.clone(),
            kind,
        });
        let announcement = ServerEvent::NewProducer {
            producer_id,
            participant_id: membership.participant_id.clone(),
            kind,
        };
        for peer in peers {
            let _ = peer.send(announcement.clone());
        }
        Ok(())
    }

    async fn consume(
        &self,
        transport_id: String,
        producer_id: String,
        rtp_capabilities: RtpCapabilities,
    ) -> Result<(), ServerError> {
        let membership = self.membership.as_ref().ok_or(ServerError::NotInRoom)?;
        let transport = self
            .registry
            .transport(&membership.room_id, &self.connection_id, &transport_id)
            .await?;

        // Capability gate before any consumer exists, so an incompatible
        // request leaves no engine object behind.
        if !membership
            .router
            .can_consume(&producer_id, &rtp_capabilities)
            .await
        {
            return Err(ServerError::IncompatibleCapabilities(producer_id));
        }

        // Consumers always start paused; the client resumes explicitly once
        // its receiving side is wired up.
        let consumer = transport
            .consume(&producer_id, rtp_capabilities, true)
            .await?;

        let created = ServerEvent::ConsumerCreated {
            id: consumer.id().to_string(),
            producer_id,
            kind: consumer.kind(),
            rtp_parameters: consumer.rtp_parameters(),
        };
        if let Err(error) = self
            .registry
            .insert_consumer(
                &membership.room_id,
                &self.connection_id,
                Arc::clone(&consumer),
            )
            .await
        {
            consumer.close();
            return Err(error);
        }

        self.send(created);
        Ok(())
    }

    async fn resume_consumer(&self, consumer_id: String) -> Result<(), ServerError> {
        let membership = self.membership.as_ref().ok_or(ServerError::NotInRoom)?;
        let consumer = self
            .registry
            .consumer(&membership.room_id, &self.connection_id, &consumer_id)
            .await?;

        consumer.resume().await?;

        self.send(ServerEvent::ConsumerResumed { consumer_id });
        Ok(())
    }

    /// Leave the current room, if any. Idempotent.
    async fn leave_current_room(&mut self) {
        if let Some(membership) = self.membership.take() {
            self.registry
                .remove_participant(&membership.room_id, &self.connection_id)
                .await;
        }
    }

    fn send(&self, event: ServerEvent) {
        // Writer task may already be gone during teardown; nothing to do.
        let _ = self.events.send(event);
    }
}
