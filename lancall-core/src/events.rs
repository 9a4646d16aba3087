//! Typed events delivered from the engine to the presentation layer
//!
//! The engine never touches UI state directly. Every outward-facing
//! result - membership updates, chat lines, meter levels, disconnect
//! notices - crosses this channel, and the presentation layer applies
//! them on its own thread. Sends are unbounded and never block an
//! engine task; a dropped receiver is tolerated during shutdown.

use tokio::sync::{mpsc, oneshot};

use lancall_common::protocol::Member;

/// One engine event
#[derive(Debug)]
pub enum Event {
    /// A room was created locally; `code` is what joiners must enter
    RoomCreated { code: String },
    /// A peer asks to join the hosted room. Send `true` on `decision`
    /// to admit, `false` to refuse; dropping the sender also refuses.
    /// There is no timeout: an unanswered request stalls only that one
    /// connection attempt.
    JoinRequest {
        username: String,
        decision: oneshot::Sender<bool>,
    },
    /// The local join flow completed and the call is live
    JoinedRoom {
        host_username: String,
        members: Vec<Member>,
    },
    /// The local join flow failed (room not found, declined, ...)
    JoinFailed { reason: String },
    /// The membership view changed (any role, any cause)
    MembershipChanged { members: Vec<Member> },
    /// A chat line from another peer arrived
    ChatReceived { sender: String, text: String },
    /// Fresh loudness reading for a peer's incoming audio
    PeerVolumeUpdated { username: String, level: f32 },
    /// Host side: one client disconnected; the room stays open
    PeerLeft { username: String },
    /// Client side: the call is over. `host_ended` distinguishes the
    /// host closing the room from an ordinary transport failure.
    CallEnded { host_ended: bool },
    /// Host side: the room was closed and all clients notified
    RoomClosed,
    /// An audio device could not be opened or failed mid-call; the
    /// affected direction is degraded but the call continues
    AudioError { detail: String },
    /// A listener or socket could not be set up
    Error { detail: String },
}

/// Sending half handed to every engine task
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Receiving half owned by the presentation layer
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create the event channel
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
