//! Text chat over UDP broadcast
//!
//! Every member broadcasts `CHAT|<sender>|<text>` on the chat port and
//! listens on the same port. Delivery is best-effort; a sent line is
//! appended to the local log immediately, and the listener skips lines
//! whose sender matches the local username so the echo of our own
//! broadcast is not logged twice.

use std::fmt;
use std::sync::Arc;

use tokio::io;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;

use lancall_common::protocol::ControlMessage;

use crate::events::{Event, EventSender};
use crate::net::{self, Ports};

/// Largest chat datagram a listener will consider
const MAX_DATAGRAM: usize = 2048;

/// One line of the chat transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: String,
    pub text: String,
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.text)
    }
}

/// Append-only transcript shared between tasks
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    lines: Arc<RwLock<Vec<ChatLine>>>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, line: ChatLine) {
        self.lines.write().await.push(line);
    }

    pub async fn snapshot(&self) -> Vec<ChatLine> {
        self.lines.read().await.clone()
    }

    /// Start a fresh transcript (new room or call)
    pub async fn clear(&self) {
        self.lines.write().await.clear();
    }
}

/// Broadcast one chat line, logging it locally first
///
/// The local append happens before the send so our own line is in the
/// transcript even if the broadcast fails.
pub async fn send_chat(
    log: &ChatLog,
    username: &str,
    text: &str,
    ports: Ports,
) -> io::Result<()> {
    log.append(ChatLine {
        sender: username.to_string(),
        text: text.to_string(),
    })
    .await;

    let socket = net::broadcast_socket()?;
    let message = ControlMessage::Chat {
        sender: username.to_string(),
        text: text.to_string(),
    }
    .encode();
    socket
        .send_to(message.as_bytes(), (net::BROADCAST_ADDR, ports.chat))
        .await?;
    Ok(())
}

/// Log every chat line heard on the chat port, skipping our own
pub async fn run_listener(
    socket: UdpSocket,
    log: ChatLog,
    local_username: String,
    events: EventSender,
    debug: bool,
) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let (len, _) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                if debug {
                    eprintln!("Chat: receive error: {}", e);
                }
                break;
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            continue;
        };
        if let Some(ControlMessage::Chat { sender, text }) = ControlMessage::parse(text) {
            if sender == local_username {
                continue;
            }
            log.append(ChatLine {
                sender: sender.clone(),
                text: text.clone(),
            })
            .await;
            let _ = events.send(Event::ChatReceived { sender, text });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use crate::events;

    async fn listener_fixture(
        local: &str,
    ) -> (std::net::SocketAddr, ChatLog, events::EventReceiver) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind listener");
        let addr = socket.local_addr().expect("local addr");
        let log = ChatLog::new();
        let (event_tx, event_rx) = events::channel();
        tokio::spawn(run_listener(
            socket,
            log.clone(),
            local.to_string(),
            event_tx,
            false,
        ));
        (addr, log, event_rx)
    }

    #[tokio::test]
    async fn test_listener_logs_peer_lines() {
        let (addr, log, mut events) = listener_fixture("alice").await;

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind sender");
        sender
            .send_to(b"CHAT|bob|hi there", addr)
            .await
            .expect("send");

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event within deadline")
            .expect("event");
        assert!(matches!(
            event,
            Event::ChatReceived { ref sender, ref text } if sender == "bob" && text == "hi there"
        ));
        assert_eq!(
            log.snapshot().await,
            vec![ChatLine {
                sender: "bob".to_string(),
                text: "hi there".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_listener_skips_own_echo() {
        let (addr, log, mut events) = listener_fixture("alice").await;

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind sender");
        sender
            .send_to(b"CHAT|alice|talking to myself", addr)
            .await
            .expect("send");

        let event = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
        assert!(event.is_err(), "own echo must not surface");
        assert!(log.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_chat_text_may_contain_pipes() {
        let (addr, log, mut events) = listener_fixture("alice").await;

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind sender");
        sender
            .send_to(b"CHAT|bob|a|b|c", addr)
            .await
            .expect("send");

        let _ = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event within deadline");
        assert_eq!(log.snapshot().await[0].text, "a|b|c");
    }

    #[tokio::test]
    async fn test_display_formats_sender_and_text() {
        let line = ChatLine {
            sender: "bob".to_string(),
            text: "hello".to_string(),
        };
        assert_eq!(line.to_string(), "bob: hello");
    }
}
