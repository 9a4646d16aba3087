//! Presence: membership snapshot broadcasts
//!
//! The host broadcasts `USER_LIST|...` on every membership change and
//! on a steady timer while the room is open. Clients replace their
//! local view wholesale with each snapshot received: last writer wins,
//! no sequence numbers. A delayed duplicate can briefly overwrite
//! newer state; the periodic rebroadcast converges it again.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Notify;

use lancall_common::protocol::ControlMessage;

use crate::events::{Event, EventSender};
use crate::net::{self, Ports};
use crate::room::Roster;

/// Steady-state interval between snapshot broadcasts
pub const PRESENCE_INTERVAL: Duration = Duration::from_secs(2);

/// Largest presence datagram a listener will consider
const MAX_DATAGRAM: usize = 2048;

/// Host side: broadcast roster snapshots until aborted
///
/// Wakes on `changed` for immediate rebroadcast after a membership
/// mutation, and on the timer otherwise. The first tick fires at once,
/// so a fresh room announces itself immediately.
pub async fn run_broadcaster(roster: Roster, changed: Arc<Notify>, ports: Ports, debug: bool) {
    let socket = match net::broadcast_socket() {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("Presence: broadcast socket error: {}", e);
            return;
        }
    };

    let mut tick = tokio::time::interval(PRESENCE_INTERVAL);
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = changed.notified() => {}
        }

        let members = roster.snapshot().await;
        let message = ControlMessage::UserList { members }.encode();
        if let Err(e) = socket
            .send_to(message.as_bytes(), (net::BROADCAST_ADDR, ports.presence))
            .await
            && debug
        {
            eprintln!("Presence: broadcast error: {}", e);
        }
    }
}

/// Client side: adopt every snapshot heard on the presence port
///
/// Each `USER_LIST` datagram replaces the replica roster and surfaces
/// [`Event::MembershipChanged`]. Malformed datagrams are dropped.
pub async fn run_listener(socket: UdpSocket, roster: Roster, events: EventSender, debug: bool) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (len, _) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                if debug {
                    eprintln!("Presence: receive error: {}", e);
                }
                break;
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            continue;
        };
        if let Some(ControlMessage::UserList { members }) = ControlMessage::parse(text) {
            roster.replace(members.clone()).await;
            let _ = events.send(Event::MembershipChanged { members });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use lancall_common::protocol::Member;

    use crate::events;

    #[tokio::test]
    async fn test_listener_replaces_roster_wholesale() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind listener");
        let addr = socket.local_addr().expect("local addr");

        let roster = Roster::new();
        roster.add(Member::client("stale")).await;

        let (event_tx, mut event_rx) = events::channel();
        let task = tokio::spawn(run_listener(socket, roster.clone(), event_tx, false));

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind sender");
        sender
            .send_to(b"USER_LIST|alice:host,bob:client", addr)
            .await
            .expect("send snapshot");

        let event = tokio::time::timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .expect("event within deadline")
            .expect("event");
        let Event::MembershipChanged { members } = event else {
            panic!("expected MembershipChanged, got {:?}", event);
        };
        assert_eq!(members, vec![Member::host("alice"), Member::client("bob")]);
        assert_eq!(roster.snapshot().await, members);

        task.abort();
    }

    #[tokio::test]
    async fn test_duplicate_snapshot_is_idempotent() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind listener");
        let addr = socket.local_addr().expect("local addr");

        let roster = Roster::new();
        let (event_tx, mut event_rx) = events::channel();
        let task = tokio::spawn(run_listener(socket, roster.clone(), event_tx, false));

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind sender");
        for _ in 0..2 {
            sender
                .send_to(b"USER_LIST|alice:host,bob:client", addr)
                .await
                .expect("send snapshot");
            let _ = tokio::time::timeout(Duration::from_secs(2), event_rx.recv())
                .await
                .expect("event within deadline");
        }

        assert_eq!(
            roster.snapshot().await,
            vec![Member::host("alice"), Member::client("bob")]
        );

        task.abort();
    }

    #[tokio::test]
    async fn test_listener_drops_garbage() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind listener");
        let addr = socket.local_addr().expect("local addr");

        let roster = Roster::new();
        let (event_tx, mut event_rx) = events::channel();
        let task = tokio::spawn(run_listener(socket, roster.clone(), event_tx, false));

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind sender");
        sender
            .send_to(b"CHAT|bob|wrong channel", addr)
            .await
            .expect("send");
        sender.send_to(b"garbage", addr).await.expect("send");

        let event = tokio::time::timeout(Duration::from_millis(300), event_rx.recv()).await;
        assert!(event.is_err(), "garbage must not surface events");
        assert!(roster.is_empty().await);

        task.abort();
    }
}
