//! TCP join handshake
//!
//! One persistent connection per admitted client, established by a
//! single request/response exchange on the session port. The same
//! socket then carries the raw PCM audio stream, so an accepted
//! handshake hands the connection straight to the audio pipeline.

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, oneshot};

use lancall_common::protocol::{ControlMessage, Member};

use crate::events::{Event, EventSender};
use crate::room::Roster;

/// Largest handshake message either side will read
const MAX_HANDSHAKE_BYTES: usize = 1024;

/// What a successful client-side handshake yields
pub struct JoinSuccess {
    /// The host's display name, taken from the ACCEPT message
    pub host_username: String,
    /// Membership snapshot at admission time, in host join order
    pub members: Vec<Member>,
    /// The open connection, ready for the audio pipeline
    pub stream: TcpStream,
}

/// Why a client-side join failed
#[derive(Debug)]
pub enum JoinError {
    /// The host declined, or sent something other than ACCEPT
    Rejected,
    /// The connection itself failed
    Io(io::Error),
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Rejected => f.write_str("connection declined by host"),
            JoinError::Io(e) => write!(f, "failed to connect: {}", e),
        }
    }
}

impl From<io::Error> for JoinError {
    fn from(e: io::Error) -> Self {
        JoinError::Io(e)
    }
}

/// Client side: request entry into a discovered room
///
/// Sends one `REQUEST` and blocks for the single response. Anything
/// other than a well-formed `ACCEPT` - including an empty read or a
/// socket error - is a rejection, and the connection is dropped.
pub async fn join_room(
    host: IpAddr,
    port: u16,
    username: &str,
    room_code: &str,
) -> Result<JoinSuccess, JoinError> {
    let mut stream = TcpStream::connect((host, port)).await?;
    let request = ControlMessage::JoinRequest {
        username: username.to_string(),
        room_code: room_code.to_string(),
    }
    .encode();
    stream.write_all(request.as_bytes()).await?;

    let mut buf = [0u8; MAX_HANDSHAKE_BYTES];
    let len = stream.read(&mut buf).await?;
    if len == 0 {
        return Err(JoinError::Rejected);
    }
    let Ok(text) = std::str::from_utf8(&buf[..len]) else {
        return Err(JoinError::Rejected);
    };
    match ControlMessage::parse(text) {
        Some(ControlMessage::Accept {
            host_username,
            members,
        }) => Ok(JoinSuccess {
            host_username,
            members,
            stream,
        }),
        _ => Err(JoinError::Rejected),
    }
}

/// Host side: run one incoming connection through the admission gate
///
/// Reads one request and declines immediately on a malformed message,
/// a code mismatch, or a username already present in the roster. A
/// well-formed request surfaces [`Event::JoinRequest`] and blocks this
/// connection's task - and only this one - until the presentation
/// layer answers; there is deliberately no timeout on that gate.
///
/// On acceptance the member is appended to the roster, the presence
/// broadcaster is kicked, `ACCEPT` is written, and the open stream is
/// returned with the admitted username so the caller can start the
/// audio pipeline. Every refusal path returns `None` after writing
/// `DECLINE`.
pub async fn handle_join_request(
    mut stream: TcpStream,
    room_code: &str,
    host_username: &str,
    roster: &Roster,
    presence_changed: &Arc<Notify>,
    events: &EventSender,
    debug: bool,
) -> Option<(String, TcpStream)> {
    let mut buf = [0u8; MAX_HANDSHAKE_BYTES];
    let len = match stream.read(&mut buf).await {
        Ok(0) | Err(_) => return None,
        Ok(len) => len,
    };

    let request = std::str::from_utf8(&buf[..len])
        .ok()
        .and_then(ControlMessage::parse);
    let Some(ControlMessage::JoinRequest {
        username,
        room_code: requested,
    }) = request
    else {
        return decline(stream, debug, "malformed request").await;
    };

    if requested != room_code {
        return decline(stream, debug, "room code mismatch").await;
    }
    if roster.contains(&username).await {
        return decline(stream, debug, "username already in room").await;
    }

    // Hand the decision to the presentation layer and wait. A dropped
    // sender (receiver gone, e.g. during shutdown) counts as a refusal.
    let (decision_tx, decision_rx) = oneshot::channel();
    let surfaced = events.send(Event::JoinRequest {
        username: username.clone(),
        decision: decision_tx,
    });
    let accepted = surfaced.is_ok() && decision_rx.await.unwrap_or(false);
    if !accepted {
        return decline(stream, debug, "refused by host").await;
    }

    // Re-check under the roster's write lock: another handshake for
    // the same name may have been admitted while this one was waiting
    // on the decision.
    if !roster.add_if_absent(Member::client(username.clone())).await {
        return decline(stream, debug, "username already in room").await;
    }
    presence_changed.notify_one();

    let accept = ControlMessage::Accept {
        host_username: host_username.to_string(),
        members: roster.snapshot().await,
    }
    .encode();
    if stream.write_all(accept.as_bytes()).await.is_err() {
        // The client vanished between decision and reply; undo.
        roster.remove(&username).await;
        presence_changed.notify_one();
        return None;
    }

    if debug {
        eprintln!("Session: admitted {}", username);
    }
    Some((username, stream))
}

async fn decline(mut stream: TcpStream, debug: bool, reason: &str) -> Option<(String, TcpStream)> {
    if debug {
        eprintln!("Session: declined connection ({})", reason);
    }
    let _ = stream
        .write_all(ControlMessage::Decline.encode().as_bytes())
        .await;
    None
}
