//! Client-side session controller for the Huddle signaling protocol.
//!
//! [`SessionController`] runs as an actor on its own task, owning all
//! per-connection client state: the roster, local transports, the pending
//! producer queue and the per-participant composite streams. Callers drive
//! it through a cloneable [`SessionControllerHandle`].
//!
//! The controller speaks `huddle-protocol` messages over a plain channel
//! pair; bridging those channels to an actual socket is the embedder's job,
//! which also makes the whole crate testable without any network.

pub mod controller;
pub mod errors;
pub mod transport;

pub use controller::{
    ControllerSnapshot, JoinSummary, RemoteStream, RemoteTrack, SessionController,
    SessionControllerHandle, TransportPair, REQUEST_TIMEOUT,
};
pub use errors::ClientError;
pub use transport::{LocalTransport, TransportState};
