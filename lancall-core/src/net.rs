//! UDP socket plumbing for the broadcast channels
//!
//! Discovery, presence and chat all ride subnet broadcasts on fixed
//! ports. Listener sockets are created through socket2 so several
//! peers on the same machine can share a port (SO_REUSEADDR, plus
//! SO_REUSEPORT where available) before being handed to tokio.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use lancall_common::{
    DEFAULT_CHAT_PORT, DEFAULT_DISCOVERY_PORT, DEFAULT_PRESENCE_PORT, DEFAULT_SESSION_PORT,
};

/// Destination address for subnet broadcasts
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// The well-known ports a room lives on
///
/// All four default to the stock values; a front end may override them
/// so multiple independent room sets can coexist on one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    /// TCP: join handshake and the audio stream that follows it
    pub session: u16,
    /// UDP: discovery queries and replies
    pub discovery: u16,
    /// UDP: membership snapshot broadcasts
    pub presence: u16,
    /// UDP: chat broadcasts
    pub chat: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            session: DEFAULT_SESSION_PORT,
            discovery: DEFAULT_DISCOVERY_PORT,
            presence: DEFAULT_PRESENCE_PORT,
            chat: DEFAULT_CHAT_PORT,
        }
    }
}

/// Bind a UDP listener socket on every interface with address reuse
///
/// Reuse matters on the presence and chat ports: every peer on the
/// machine binds the same port to hear the same broadcasts.
pub fn bind_reusable_udp(port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;
    let addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

/// Create an unbound-port UDP socket for sending subnet broadcasts
pub fn broadcast_socket() -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;
    let addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let ports = Ports::default();
        assert_eq!(ports.session, 50007);
        assert_eq!(ports.discovery, 50008);
        assert_eq!(ports.presence, 50009);
        assert_eq!(ports.chat, 50010);
    }

    #[tokio::test]
    async fn test_two_listeners_share_a_port() {
        let first = bind_reusable_udp(0).expect("first bind");
        let port = first.local_addr().expect("local addr").port();
        let second = bind_reusable_udp(port);
        assert!(second.is_ok(), "second bind on {} should succeed", port);
    }

    #[tokio::test]
    async fn test_broadcast_socket_binds_ephemeral_port() {
        let socket = broadcast_socket().expect("socket");
        assert_ne!(socket.local_addr().expect("local addr").port(), 0);
    }
}
