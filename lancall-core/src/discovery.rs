//! Room discovery over UDP broadcast
//!
//! A joining client broadcasts `DISCOVER|<code>|<username>` on the
//! discovery port; the host answering for that exact code replies
//! `ROOM_FOUND` unicast, and the reply's source address becomes the
//! candidate host IP. No retry here - the caller may try again.

use std::net::IpAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use lancall_common::protocol::ControlMessage;

use crate::net::{self, Ports};

/// How long a client waits for a discovery reply
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest datagram a discovery socket will consider
const MAX_DATAGRAM: usize = 256;

/// Host side: answer discovery queries for the active room
///
/// Replies only to well-formed queries carrying exactly the hosted
/// code; everything else is dropped without a response. Runs until the
/// socket fails or the task is aborted when the room closes.
pub async fn run_responder(socket: UdpSocket, room_code: String, debug: bool) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                if debug {
                    eprintln!("Discovery: receive error: {}", e);
                }
                break;
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            continue;
        };
        match ControlMessage::parse(text) {
            Some(ControlMessage::Discover {
                room_code: requested,
                username,
            }) if requested == room_code => {
                if debug {
                    eprintln!("Discovery: query from {} at {}", username, addr);
                }
                let reply = ControlMessage::RoomFound.encode();
                let _ = socket.send_to(reply.as_bytes(), addr).await;
            }
            // Wrong code or malformed datagram: stay silent.
            _ => {}
        }
    }
}

/// Client side: locate the host for a room code
///
/// Broadcasts one query, then waits up to [`DISCOVERY_TIMEOUT`] for a
/// `ROOM_FOUND` reply. Returns the responder's address, or `None` when
/// the room was not found - timeouts and socket errors alike surface
/// as "no room", matching the user-visible behavior.
pub async fn discover_host(room_code: &str, username: &str, ports: Ports) -> Option<IpAddr> {
    let socket = net::broadcast_socket().ok()?;
    let query = ControlMessage::Discover {
        room_code: room_code.to_string(),
        username: username.to_string(),
    }
    .encode();
    socket
        .send_to(query.as_bytes(), (net::BROADCAST_ADDR, ports.discovery))
        .await
        .ok()?;

    let mut buf = [0u8; MAX_DATAGRAM];
    let wait = tokio::time::timeout(DISCOVERY_TIMEOUT, async {
        loop {
            let (len, addr) = socket.recv_from(&mut buf).await.ok()?;
            if let Ok(text) = std::str::from_utf8(&buf[..len])
                && ControlMessage::parse(text) == Some(ControlMessage::RoomFound)
            {
                return Some(addr.ip());
            }
            // Anything else on this socket is noise; keep waiting.
        }
    })
    .await;

    wait.ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    async fn responder_on_loopback(room_code: &str) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind responder");
        let addr = socket.local_addr().expect("local addr");
        let code = room_code.to_string();
        let task = tokio::spawn(run_responder(socket, code, false));
        (addr, task)
    }

    #[tokio::test]
    async fn test_responder_answers_matching_code() {
        let (addr, task) = responder_on_loopback("aB3dE5gH7jK9mN1pQ3sT5vW7").await;

        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind client");
        client
            .send_to(b"DISCOVER|aB3dE5gH7jK9mN1pQ3sT5vW7|bob", addr)
            .await
            .expect("send query");

        let mut buf = [0u8; 64];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("reply within deadline")
            .expect("receive reply");
        assert_eq!(&buf[..len], b"ROOM_FOUND");
        assert_eq!(from, addr);

        task.abort();
    }

    #[tokio::test]
    async fn test_responder_ignores_wrong_code_and_garbage() {
        let (addr, task) = responder_on_loopback("aB3dE5gH7jK9mN1pQ3sT5vW7").await;

        let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind client");
        client
            .send_to(b"DISCOVER|xxxxxxxxxxxxxxxxxxxxxxxx|bob", addr)
            .await
            .expect("send wrong code");
        client
            .send_to(b"not a control message", addr)
            .await
            .expect("send garbage");
        client
            .send_to(&[0xff, 0xfe, 0x00], addr)
            .await
            .expect("send non-utf8");

        let mut buf = [0u8; 64];
        let reply = tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
        assert!(reply.is_err(), "responder must stay silent");

        task.abort();
    }

    #[tokio::test]
    async fn test_discover_host_times_out_when_no_room_exists() {
        // Nothing is listening on this discovery port.
        let ports = Ports {
            discovery: 57431,
            ..Ports::default()
        };
        let found = discover_host("aB3dE5gH7jK9mN1pQ3sT5vW7", "bob", ports).await;
        assert_eq!(found, None);
    }
}
