//! Client-side session controller.
//!
//! An actor owning all client signaling state for one connection. Callers
//! hold a [`SessionControllerHandle`] and issue commands; the actor
//! multiplexes those against the server's event stream on a single task, so
//! no state is ever shared across threads.
//!
//! The controller is transport-agnostic: it writes `ClientMessage`s into an
//! outbound channel and reads `ServerEvent`s from an inbound channel.
//! Whatever bridges those channels to a socket is outside this crate.
//!
//! # Request model
//!
//! `join_room`, `setup_transports` and `produce` are request/response:
//! the actor records a pending entry with a deadline and resolves it from
//! the matching server event, an `error` event (oldest pending request is
//! rejected), a timeout, or channel closure (all pending requests fail).
//!
//! # Producer discovery
//!
//! `new-producer` events that arrive before the receive transport is
//! connected are queued and consumed in arrival order once it is. Each
//! created consumer is resumed immediately and folded into the owning
//! participant's composite stream.

use crate::errors::ClientError;
use crate::transport::{LocalTransport, TransportState};
use huddle_protocol::{
    ClientMessage, MediaKind, ParticipantSummary, RtpCapabilities, RtpParameters, ServerEvent,
    TransportDirection,
};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Deadline for join, transport setup and produce requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const COMMAND_BUFFER: usize = 32;

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinSummary {
    pub room_id: String,
    pub participant_id: String,
    pub participants: Vec<ParticipantSummary>,
}

/// Both transports of a connection, reported once connected.
#[derive(Debug, Clone)]
pub struct TransportPair {
    pub send: LocalTransport,
    pub recv: LocalTransport,
}

/// One received media track.
#[derive(Debug, Clone)]
pub struct RemoteTrack {
    pub consumer_id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    /// False until the server confirms the consumer resumed.
    pub active: bool,
}

/// Composite stream of one remote participant.
///
/// Rebuilt whenever a track is added or replaced; `generation` increments on
/// every rebuild so renderers can detect changes cheaply.
#[derive(Debug, Clone)]
pub struct RemoteStream {
    pub participant_id: String,
    pub tracks: Vec<RemoteTrack>,
    pub generation: u64,
}

/// Point-in-time view of the controller state.
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    pub room_id: Option<String>,
    pub participant_id: Option<String>,
    pub participants: Vec<ParticipantSummary>,
    pub remote_streams: HashMap<String, RemoteStream>,
    /// Producers waiting for the receive transport.
    pub pending_producers: usize,
    pub audio_muted: bool,
    pub video_stopped: bool,
}

struct Pending<T> {
    respond_to: oneshot::Sender<Result<T, ClientError>>,
    deadline: Instant,
}

#[derive(Default)]
struct TrackSlots {
    audio: Option<RemoteTrack>,
    video: Option<RemoteTrack>,
}

enum Command {
    JoinRoom {
        room_id: String,
        participant_name: String,
        respond_to: oneshot::Sender<Result<JoinSummary, ClientError>>,
    },
    SetupTransports {
        respond_to: oneshot::Sender<Result<TransportPair, ClientError>>,
    },
    Produce {
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        respond_to: oneshot::Sender<Result<String, ClientError>>,
    },
    SetAudioMuted(bool),
    SetVideoStopped(bool),
    Leave {
        respond_to: oneshot::Sender<()>,
    },
    Snapshot {
        respond_to: oneshot::Sender<ControllerSnapshot>,
    },
}

/// Cloneable handle to a running [`SessionController`].
#[derive(Clone)]
pub struct SessionControllerHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl SessionControllerHandle {
    /// Join a room. Fails with [`ClientError::JoinInProgress`] while another
    /// join is outstanding; joining the current room again returns the
    /// current roster without a server round trip.
    pub async fn join_room(
        &self,
        room_id: &str,
        participant_name: &str,
    ) -> Result<JoinSummary, ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.send_command(Command::JoinRoom {
            room_id: room_id.to_string(),
            participant_name: participant_name.to_string(),
            respond_to,
        })
        .await?;
        response.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    /// Create and connect the send/recv transport pair.
    pub async fn setup_transports(&self) -> Result<TransportPair, ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.send_command(Command::SetupTransports { respond_to })
            .await?;
        response.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    /// Publish a local track; resolves to the server-side producer id.
    pub async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<String, ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.send_command(Command::Produce {
            kind,
            rtp_parameters,
            respond_to,
        })
        .await?;
        response.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    pub async fn set_audio_muted(&self, muted: bool) -> Result<(), ClientError> {
        self.send_command(Command::SetAudioMuted(muted)).await
    }

    pub async fn set_video_stopped(&self, stopped: bool) -> Result<(), ClientError> {
        self.send_command(Command::SetVideoStopped(stopped)).await
    }

    /// Leave the current room. A no-op when not joined.
    pub async fn leave(&self) -> Result<(), ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.send_command(Command::Leave { respond_to }).await?;
        response.await.map_err(|_| ClientError::ConnectionClosed)
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot, ClientError> {
        let (respond_to, response) = oneshot::channel();
        self.send_command(Command::Snapshot { respond_to }).await?;
        response.await.map_err(|_| ClientError::ConnectionClosed)
    }

    /// Stop the controller task. Outstanding requests fail with
    /// [`ClientError::ConnectionClosed`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn send_command(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }
}

/// The controller actor. Construct with [`SessionController::spawn`].
pub struct SessionController {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<ServerEvent>,
    commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,

    rtp_capabilities: Option<RtpCapabilities>,
    room_id: Option<String>,
    participant_id: Option<String>,
    participants: Vec<ParticipantSummary>,

    send_transport: Option<LocalTransport>,
    recv_transport: Option<LocalTransport>,

    /// producer id -> owning participant id; kept while consumers live.
    producer_owner: HashMap<String, String>,
    /// consumer id -> owning participant id.
    consumer_owner: HashMap<String, String>,
    /// Producers announced before the receive transport was ready.
    pending_producers: VecDeque<String>,
    /// Consume requests in flight that no caller is waiting on.
    outstanding_consumes: usize,
    slots: HashMap<String, TrackSlots>,
    remote_streams: HashMap<String, RemoteStream>,

    pending_join: Option<Pending<JoinSummary>>,
    pending_transports: Option<Pending<TransportPair>>,
    pending_produces: VecDeque<Pending<String>>,

    audio_muted: bool,
    video_stopped: bool,
}

impl SessionController {
    /// Spawn the controller on its own task and return a handle to it.
    pub fn spawn(
        outbound: mpsc::UnboundedSender<ClientMessage>,
        inbound: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> SessionControllerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();
        let controller = Self {
            outbound,
            inbound,
            commands: commands_rx,
            cancel: cancel.clone(),
            rtp_capabilities: None,
            room_id: None,
            participant_id: None,
            participants: Vec::new(),
            send_transport: None,
            recv_transport: None,
            producer_owner: HashMap::new(),
            consumer_owner: HashMap::new(),
            pending_producers: VecDeque::new(),
            outstanding_consumes: 0,
            slots: HashMap::new(),
            remote_streams: HashMap::new(),
            pending_join: None,
            pending_transports: None,
            pending_produces: VecDeque::new(),
            audio_muted: false,
            video_stopped: false,
        };
        tokio::spawn(controller.run());
        SessionControllerHandle {
            commands: commands_tx,
            cancel,
        }
    }

    async fn run(mut self) {
        loop {
            let deadline = self.earliest_deadline();
            tokio::select! {
                () = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = self.inbound.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!(target: "huddle.client", "Server event stream closed");
                        break;
                    }
                },
                () = wait_until(deadline), if deadline.is_some() => self.expire_pending(),
            }
        }
        self.fail_all_pending(ClientError::ConnectionClosed);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::JoinRoom {
                room_id,
                participant_name,
                respond_to,
            } => self.start_join(room_id, participant_name, respond_to),
            Command::SetupTransports { respond_to } => self.start_transport_setup(respond_to),
            Command::Produce {
                kind,
                rtp_parameters,
                respond_to,
            } => self.start_produce(kind, rtp_parameters, respond_to),
            Command::SetAudioMuted(muted) => self.audio_muted = muted,
            Command::SetVideoStopped(stopped) => self.video_stopped = stopped,
            Command::Leave { respond_to } => {
                if self.room_id.is_some() {
                    self.send(ClientMessage::LeaveRoom);
                    self.reset_room_state();
                }
                let _ = respond_to.send(());
            }
            Command::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn start_join(
        &mut self,
        room_id: String,
        participant_name: String,
        respond_to: oneshot::Sender<Result<JoinSummary, ClientError>>,
    ) {
        // Duplicate-join suppression.
        if self.pending_join.is_some() {
            let _ = respond_to.send(Err(ClientError::JoinInProgress));
            return;
        }
        if let (Some(current), Some(participant_id)) = (&self.room_id, &self.participant_id) {
            if *current == room_id {
                let _ = respond_to.send(Ok(JoinSummary {
                    room_id,
                    participant_id: participant_id.clone(),
                    participants: self.participants.clone(),
                }));
                return;
            }
            // Switching rooms: the server leaves the old room implicitly,
            // drop our view of it.
            self.reset_room_state();
        }

        if !self.send(ClientMessage::JoinRoom {
            room_id,
            participant_name,
        }) {
            let _ = respond_to.send(Err(ClientError::ConnectionClosed));
            return;
        }
        self.pending_join = Some(Pending {
            respond_to,
            deadline: Instant::now() + REQUEST_TIMEOUT,
        });
    }

    fn start_transport_setup(
        &mut self,
        respond_to: oneshot::Sender<Result<TransportPair, ClientError>>,
    ) {
        if self.pending_transports.is_some() {
            let _ = respond_to.send(Err(ClientError::Rejected(
                "Transport setup already in progress".to_string(),
            )));
            return;
        }
        if let (Some(send), Some(recv)) = (&self.send_transport, &self.recv_transport) {
            if send.is_connected() && recv.is_connected() {
                let _ = respond_to.send(Ok(TransportPair {
                    send: send.clone(),
                    recv: recv.clone(),
                }));
                return;
            }
        }

        // Request only directions with no transport yet. Transports left over
        // from a timed-out attempt are still registered server-side; keeping
        // them resolves this request when the server confirms the connect,
        // instead of piling a second pair onto the participant.
        let mut sent = true;
        if self.send_transport.is_none() {
            sent &= self.send(ClientMessage::CreateTransport {
                direction: TransportDirection::Send,
            });
        }
        if self.recv_transport.is_none() {
            sent &= self.send(ClientMessage::CreateTransport {
                direction: TransportDirection::Recv,
            });
        }
        if !sent {
            let _ = respond_to.send(Err(ClientError::ConnectionClosed));
            return;
        }
        self.pending_transports = Some(Pending {
            respond_to,
            deadline: Instant::now() + REQUEST_TIMEOUT,
        });
    }

    fn start_produce(
        &mut self,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        respond_to: oneshot::Sender<Result<String, ClientError>>,
    ) {
        let Some(send_transport) = self.send_transport.as_ref().filter(|t| t.is_connected())
        else {
            let _ = respond_to.send(Err(ClientError::TransportNotReady));
            return;
        };

        if self
            .outbound
            .send(ClientMessage::Produce {
                transport_id: send_transport.id.clone(),
                kind,
                rtp_parameters,
            })
            .is_err()
        {
            let _ = respond_to.send(Err(ClientError::ConnectionClosed));
            return;
        }
        self.pending_produces.push_back(Pending {
            respond_to,
            deadline: Instant::now() + REQUEST_TIMEOUT,
        });
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::RtpCapabilities { rtp_capabilities } => {
                self.rtp_capabilities = Some(rtp_capabilities);
            }
            ServerEvent::RoomJoined {
                room_id,
                participant_id,
                participants,
            } => {
                self.room_id = Some(room_id.clone());
                self.participant_id = Some(participant_id.clone());
                self.participants = participants.clone();
                if let Some(pending) = self.pending_join.take() {
                    let _ = pending.respond_to.send(Ok(JoinSummary {
                        room_id,
                        participant_id,
                        participants,
                    }));
                }
            }
            ServerEvent::ParticipantJoined { participant } => {
                if !self.participants.iter().any(|p| p.id == participant.id) {
                    self.participants.push(participant);
                }
            }
            ServerEvent::ParticipantLeft { participant_id } => {
                self.forget_participant(&participant_id);
            }
            ServerEvent::NewProducer {
                producer_id,
                participant_id,
                ..
            } => {
                // A broadcast can race the join backfill; one consume per
                // producer id, ever.
                if self.producer_owner.contains_key(&producer_id) {
                    debug!(
                        target: "huddle.client",
                        producer_id = %producer_id,
                        "Ignoring repeated producer announcement"
                    );
                    return;
                }
                self.producer_owner
                    .insert(producer_id.clone(), participant_id);
                match self.connected_recv_transport_id() {
                    Some(transport_id) => self.send_consume(&transport_id, producer_id),
                    None => {
                        debug!(
                            target: "huddle.client",
                            producer_id = %producer_id,
                            queued = self.pending_producers.len() + 1,
                            "Receive transport not ready, queueing producer"
                        );
                        self.pending_producers.push_back(producer_id);
                    }
                }
            }
            ServerEvent::TransportCreated {
                id,
                ice_parameters,
                ice_candidates,
                dtls_parameters,
                direction,
            } => {
                let mut transport = LocalTransport::new(
                    id.clone(),
                    direction,
                    ice_parameters,
                    ice_candidates,
                    dtls_parameters.clone(),
                );
                // Answer DTLS right away; the server confirms with
                // transport-connected.
                if self.send(ClientMessage::ConnectTransport {
                    transport_id: id,
                    dtls_parameters,
                }) {
                    transport.begin_connect();
                }
                match direction {
                    TransportDirection::Send => self.send_transport = Some(transport),
                    TransportDirection::Recv => self.recv_transport = Some(transport),
                }
            }
            ServerEvent::TransportConnected { transport_id } => {
                self.mark_transport_connected(&transport_id);
            }
            ServerEvent::ProducerCreated { id, .. } => {
                if let Some(pending) = self.pending_produces.pop_front() {
                    let _ = pending.respond_to.send(Ok(id));
                } else {
                    warn!(
                        target: "huddle.client",
                        producer_id = %id,
                        "producer-created without an outstanding produce request"
                    );
                }
            }
            ServerEvent::ConsumerCreated {
                id,
                producer_id,
                kind,
                rtp_parameters,
            } => {
                self.outstanding_consumes = self.outstanding_consumes.saturating_sub(1);
                self.accept_consumer(id, producer_id, kind, rtp_parameters);
            }
            ServerEvent::ConsumerResumed { consumer_id } => {
                self.activate_track(&consumer_id);
            }
            ServerEvent::Error { message } => self.handle_error_event(message),
        }
    }

    fn mark_transport_connected(&mut self, transport_id: &str) {
        let mut recv_ready = false;
        for transport in [&mut self.send_transport, &mut self.recv_transport]
            .into_iter()
            .flatten()
        {
            if transport.id == transport_id {
                transport.mark_connected();
                recv_ready = transport.direction == TransportDirection::Recv;
            }
        }

        if let (Some(send), Some(recv)) = (&self.send_transport, &self.recv_transport) {
            if send.is_connected() && recv.is_connected() {
                if let Some(pending) = self.pending_transports.take() {
                    let _ = pending.respond_to.send(Ok(TransportPair {
                        send: send.clone(),
                        recv: recv.clone(),
                    }));
                }
            }
        }

        if recv_ready {
            self.drain_pending_producers();
        }
    }

    /// Consume everything queued for the receive transport, in arrival order.
    fn drain_pending_producers(&mut self) {
        let Some(transport_id) = self.connected_recv_transport_id() else {
            return;
        };
        let queued: Vec<String> = self.pending_producers.drain(..).collect();
        for producer_id in queued {
            self.send_consume(&transport_id, producer_id);
        }
    }

    fn send_consume(&mut self, transport_id: &str, producer_id: String) {
        let Some(rtp_capabilities) = self.rtp_capabilities.clone() else {
            warn!(
                target: "huddle.client",
                producer_id = %producer_id,
                "Cannot consume before router capabilities arrived"
            );
            return;
        };
        if self.send(ClientMessage::Consume {
            transport_id: transport_id.to_string(),
            producer_id,
            rtp_capabilities,
        }) {
            self.outstanding_consumes += 1;
        }
    }

    fn accept_consumer(
        &mut self,
        consumer_id: String,
        producer_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) {
        let Some(owner) = self.producer_owner.get(&producer_id).cloned() else {
            // Owner already left; the server tears the consumer down with it.
            debug!(
                target: "huddle.client",
                producer_id = %producer_id,
                "Dropping consumer for unknown producer"
            );
            return;
        };

        self.consumer_owner
            .insert(consumer_id.clone(), owner.clone());
        let track = RemoteTrack {
            consumer_id: consumer_id.clone(),
            producer_id,
            kind,
            rtp_parameters,
            active: false,
        };
        let slots = self.slots.entry(owner.clone()).or_default();
        match kind {
            MediaKind::Audio => slots.audio = Some(track),
            MediaKind::Video => slots.video = Some(track),
        }
        self.rebuild_stream(&owner);

        // Consumers start paused server-side; resume now that the track is
        // wired into the participant's stream.
        self.send(ClientMessage::ResumeConsumer { consumer_id });
    }

    fn activate_track(&mut self, consumer_id: &str) {
        let Some(owner) = self.consumer_owner.get(consumer_id).cloned() else {
            return;
        };
        if let Some(slots) = self.slots.get_mut(&owner) {
            for track in [&mut slots.audio, &mut slots.video].into_iter().flatten() {
                if track.consumer_id == consumer_id {
                    track.active = true;
                }
            }
        }
        self.rebuild_stream(&owner);
    }

    /// Rebuild the participant's composite stream from its track slots.
    fn rebuild_stream(&mut self, participant_id: &str) {
        let Some(slots) = self.slots.get(participant_id) else {
            return;
        };
        let tracks: Vec<RemoteTrack> = [slots.audio.clone(), slots.video.clone()]
            .into_iter()
            .flatten()
            .collect();
        let generation = self
            .remote_streams
            .get(participant_id)
            .map_or(0, |s| s.generation)
            + 1;
        self.remote_streams.insert(
            participant_id.to_string(),
            RemoteStream {
                participant_id: participant_id.to_string(),
                tracks,
                generation,
            },
        );
    }

    fn forget_participant(&mut self, participant_id: &str) {
        self.participants.retain(|p| p.id != participant_id);
        self.slots.remove(participant_id);
        self.remote_streams.remove(participant_id);
        self.producer_owner.retain(|_, owner| owner != participant_id);
        self.consumer_owner.retain(|_, owner| owner != participant_id);
        let known: Vec<String> = self.producer_owner.keys().cloned().collect();
        self.pending_producers
            .retain(|producer_id| known.contains(producer_id));
    }

    /// Route a server `error` event.
    ///
    /// The wire carries no correlation ids. Consume requests the controller
    /// issues on its own are the only ones no caller waits on, so while one
    /// is outstanding the error is charged there; otherwise the oldest
    /// caller-facing request is rejected.
    fn handle_error_event(&mut self, message: String) {
        if self.outstanding_consumes > 0 {
            self.outstanding_consumes -= 1;
            warn!(
                target: "huddle.client",
                error = %message,
                "Consume request rejected by server"
            );
            return;
        }
        self.reject_oldest_pending(message);
    }

    fn reject_oldest_pending(&mut self, message: String) {
        let error = ClientError::Rejected(message);
        if let Some(pending) = self.pending_join.take() {
            let _ = pending.respond_to.send(Err(error));
        } else if let Some(pending) = self.pending_transports.take() {
            let _ = pending.respond_to.send(Err(error));
        } else if let Some(pending) = self.pending_produces.pop_front() {
            let _ = pending.respond_to.send(Err(error));
        } else {
            warn!(
                target: "huddle.client",
                error = %error,
                "Server error with no outstanding request"
            );
        }
    }

    fn earliest_deadline(&self) -> Option<Instant> {
        let mut earliest: Option<Instant> = None;
        let mut consider = |deadline: Instant| {
            earliest = Some(match earliest {
                Some(current) => current.min(deadline),
                None => deadline,
            });
        };
        if let Some(pending) = &self.pending_join {
            consider(pending.deadline);
        }
        if let Some(pending) = &self.pending_transports {
            consider(pending.deadline);
        }
        if let Some(pending) = self.pending_produces.front() {
            consider(pending.deadline);
        }
        earliest
    }

    fn expire_pending(&mut self) {
        let now = Instant::now();
        if self
            .pending_join
            .as_ref()
            .is_some_and(|p| p.deadline <= now)
        {
            if let Some(pending) = self.pending_join.take() {
                let _ = pending.respond_to.send(Err(ClientError::Timeout));
            }
        }
        if self
            .pending_transports
            .as_ref()
            .is_some_and(|p| p.deadline <= now)
        {
            if let Some(pending) = self.pending_transports.take() {
                let _ = pending.respond_to.send(Err(ClientError::Timeout));
            }
        }
        while self
            .pending_produces
            .front()
            .is_some_and(|p| p.deadline <= now)
        {
            if let Some(pending) = self.pending_produces.pop_front() {
                let _ = pending.respond_to.send(Err(ClientError::Timeout));
            }
        }
    }

    fn fail_all_pending(&mut self, error: ClientError) {
        if let Some(pending) = self.pending_join.take() {
            let _ = pending.respond_to.send(Err(error.clone()));
        }
        if let Some(pending) = self.pending_transports.take() {
            let _ = pending.respond_to.send(Err(error.clone()));
        }
        while let Some(pending) = self.pending_produces.pop_front() {
            let _ = pending.respond_to.send(Err(error.clone()));
        }
    }

    fn reset_room_state(&mut self) {
        self.room_id = None;
        self.participant_id = None;
        self.participants.clear();
        self.send_transport = None;
        self.recv_transport = None;
        self.producer_owner.clear();
        self.consumer_owner.clear();
        self.pending_producers.clear();
        self.outstanding_consumes = 0;
        self.slots.clear();
        self.remote_streams.clear();
    }

    fn connected_recv_transport_id(&self) -> Option<String> {
        self.recv_transport
            .as_ref()
            .filter(|t| t.state == TransportState::Connected)
            .map(|t| t.id.clone())
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            room_id: self.room_id.clone(),
            participant_id: self.participant_id.clone(),
            participants: self.participants.clone(),
            remote_streams: self.remote_streams.clone(),
            pending_producers: self.pending_producers.len(),
            audio_muted: self.audio_muted,
            video_stopped: self.video_stopped,
        }
    }

    /// Write a message to the server. False when the outbound channel is
    /// gone; callers decide whether that fails a request.
    fn send(&mut self, message: ClientMessage) -> bool {
        self.outbound.send(message).is_ok()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
