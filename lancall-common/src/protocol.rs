//! Control message grammar for lancall rooms
//!
//! All control traffic is pipe-delimited UTF-8 text: discovery queries
//! and replies, the join handshake, presence snapshots, and chat lines.
//! Audio never goes through this codec - frames are raw little-endian
//! 16-bit PCM written directly to the session socket.
//!
//! Parsing is total: malformed input yields `None`, never an error or
//! a panic, so listeners can drop garbage datagrams silently.

use std::fmt;

/// In-band sentinel written on the audio stream when the host closes
/// the room. The host stops sending audio before writing it, and
/// clients only interpret a read of exactly this length as the
/// sentinel, so it cannot be confused with PCM data mid-stream.
pub const HOST_ENDED: &[u8] = b"HOST_ENDED";

/// A member's role within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The peer that created and owns the room
    Host,
    /// A peer admitted through the join handshake
    Client,
}

impl Role {
    /// Wire representation used in roster lists
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Client => "client",
        }
    }

    /// Parse from the wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "host" => Some(Role::Host),
            "client" => Some(Role::Client),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a room's membership list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Display name, unique within a room instance
    pub username: String,
    /// Host or client
    pub role: Role,
}

impl Member {
    /// Create the host entry for a freshly created room
    pub fn host(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Role::Host,
        }
    }

    /// Create a client entry for an admitted peer
    pub fn client(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Role::Client,
        }
    }
}

/// Serialize a roster as `user:role,user:role,...` preserving join order
pub fn encode_roster(members: &[Member]) -> String {
    members
        .iter()
        .map(|m| format!("{}:{}", m.username, m.role.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a roster list, skipping entries without a valid `user:role` shape
pub fn parse_roster(s: &str) -> Vec<Member> {
    s.split(',')
        .filter_map(|item| {
            let (username, role) = item.split_once(':')?;
            if username.is_empty() {
                return None;
            }
            Some(Member {
                username: username.to_string(),
                role: Role::parse(role)?,
            })
        })
        .collect()
}

/// A decoded control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Client -> host broadcast: does anyone host this room code?
    Discover { room_code: String, username: String },
    /// Host -> client unicast reply to a matching discovery query
    RoomFound,
    /// Client -> host over TCP: ask to join the room
    JoinRequest { username: String, room_code: String },
    /// Host -> client over TCP: admitted, with host identity and the
    /// membership snapshot at admission time
    Accept {
        host_username: String,
        members: Vec<Member>,
    },
    /// Host -> client over TCP: refused (mismatched code, malformed
    /// request, duplicate username, or the host said no)
    Decline,
    /// Host -> all broadcast: authoritative membership snapshot
    UserList { members: Vec<Member> },
    /// Any -> all broadcast: one chat line
    Chat { sender: String, text: String },
}

impl ControlMessage {
    /// Encode to the wire text form
    pub fn encode(&self) -> String {
        match self {
            ControlMessage::Discover {
                room_code,
                username,
            } => format!("DISCOVER|{}|{}", room_code, username),
            ControlMessage::RoomFound => "ROOM_FOUND".to_string(),
            ControlMessage::JoinRequest {
                username,
                room_code,
            } => format!("REQUEST|{}|{}", username, room_code),
            ControlMessage::Accept {
                host_username,
                members,
            } => format!("ACCEPT|{}|{}", host_username, encode_roster(members)),
            ControlMessage::Decline => "DECLINE".to_string(),
            ControlMessage::UserList { members } => {
                format!("USER_LIST|{}", encode_roster(members))
            }
            ControlMessage::Chat { sender, text } => format!("CHAT|{}|{}", sender, text),
        }
    }

    /// Decode from the wire text form
    ///
    /// Returns `None` for anything that does not match the grammar.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "ROOM_FOUND" {
            return Some(ControlMessage::RoomFound);
        }
        if s == "DECLINE" {
            return Some(ControlMessage::Decline);
        }

        let (tag, rest) = s.split_once('|')?;
        match tag {
            "DISCOVER" => {
                let parts: Vec<&str> = rest.split('|').collect();
                if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
                    return None;
                }
                Some(ControlMessage::Discover {
                    room_code: parts[0].to_string(),
                    username: parts[1].to_string(),
                })
            }
            "REQUEST" => {
                let parts: Vec<&str> = rest.split('|').collect();
                if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
                    return None;
                }
                Some(ControlMessage::JoinRequest {
                    username: parts[0].to_string(),
                    room_code: parts[1].trim().to_string(),
                })
            }
            "ACCEPT" => {
                let (host_username, roster) = rest.split_once('|')?;
                if host_username.is_empty() {
                    return None;
                }
                Some(ControlMessage::Accept {
                    host_username: host_username.to_string(),
                    members: parse_roster(roster),
                })
            }
            "USER_LIST" => Some(ControlMessage::UserList {
                members: parse_roster(rest),
            }),
            // Chat text may itself contain pipes, so only the sender is
            // split off and the remainder is kept verbatim.
            "CHAT" => {
                let (sender, text) = rest.split_once('|')?;
                if sender.is_empty() {
                    return None;
                }
                Some(ControlMessage::Chat {
                    sender: sender.to_string(),
                    text: text.to_string(),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: ControlMessage) {
        let encoded = msg.encode();
        let decoded = ControlMessage::parse(&encoded).expect("should parse");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_role_roundtrip() {
        assert_eq!(Role::parse("host"), Some(Role::Host));
        assert_eq!(Role::parse("client"), Some(Role::Client));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::Host.as_str(), "host");
        assert_eq!(Role::Client.as_str(), "client");
    }

    #[test]
    fn test_discover_roundtrip() {
        roundtrip(ControlMessage::Discover {
            room_code: "aB3dE5gH7jK9mN1pQ3sT5vW7".to_string(),
            username: "alice".to_string(),
        });
    }

    #[test]
    fn test_handshake_roundtrip() {
        roundtrip(ControlMessage::JoinRequest {
            username: "bob".to_string(),
            room_code: "aB3dE5gH7jK9mN1pQ3sT5vW7".to_string(),
        });
        roundtrip(ControlMessage::Accept {
            host_username: "alice".to_string(),
            members: vec![Member::host("alice"), Member::client("bob")],
        });
        roundtrip(ControlMessage::RoomFound);
        roundtrip(ControlMessage::Decline);
    }

    #[test]
    fn test_user_list_roundtrip() {
        roundtrip(ControlMessage::UserList {
            members: vec![
                Member::host("alice"),
                Member::client("bob"),
                Member::client("carol"),
            ],
        });
    }

    #[test]
    fn test_roster_preserves_order() {
        let members = vec![
            Member::host("alice"),
            Member::client("zoe"),
            Member::client("bob"),
        ];
        let parsed = parse_roster(&encode_roster(&members));
        assert_eq!(parsed, members);
    }

    #[test]
    fn test_roster_skips_malformed_entries() {
        let parsed = parse_roster("alice:host,garbage,bob:client,:host,carol:wizard");
        assert_eq!(parsed, vec![Member::host("alice"), Member::client("bob")]);
    }

    #[test]
    fn test_chat_roundtrip() {
        roundtrip(ControlMessage::Chat {
            sender: "bob".to_string(),
            text: "hi".to_string(),
        });
    }

    #[test]
    fn test_chat_text_may_contain_pipes() {
        let msg = ControlMessage::parse("CHAT|bob|a|b|c").expect("should parse");
        assert_eq!(
            msg,
            ControlMessage::Chat {
                sender: "bob".to_string(),
                text: "a|b|c".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_input_yields_none() {
        assert_eq!(ControlMessage::parse(""), None);
        assert_eq!(ControlMessage::parse("HELLO"), None);
        assert_eq!(ControlMessage::parse("DISCOVER|onlycode"), None);
        assert_eq!(ControlMessage::parse("DISCOVER|code|user|extra"), None);
        assert_eq!(ControlMessage::parse("DISCOVER||user"), None);
        assert_eq!(ControlMessage::parse("REQUEST|bob"), None);
        assert_eq!(ControlMessage::parse("REQUEST||code"), None);
        assert_eq!(ControlMessage::parse("ACCEPT|"), None);
        assert_eq!(ControlMessage::parse("CHAT|"), None);
        assert_eq!(ControlMessage::parse("CHAT||hi"), None);
        assert_eq!(ControlMessage::parse("UNKNOWN|a|b"), None);
    }

    #[test]
    fn test_request_trims_trailing_whitespace_in_code() {
        let msg = ControlMessage::parse("REQUEST|bob|abc123 ").expect("should parse");
        assert_eq!(
            msg,
            ControlMessage::JoinRequest {
                username: "bob".to_string(),
                room_code: "abc123".to_string(),
            }
        );
    }

    #[test]
    fn test_accept_with_empty_roster() {
        let msg = ControlMessage::parse("ACCEPT|alice|").expect("should parse");
        assert_eq!(
            msg,
            ControlMessage::Accept {
                host_username: "alice".to_string(),
                members: Vec::new(),
            }
        );
    }

    #[test]
    fn test_host_ended_sentinel_bytes() {
        assert_eq!(HOST_ENDED, b"HOST_ENDED");
        // The sentinel must never parse as a control message - it lives
        // on the audio stream, not the control channels.
        assert_eq!(ControlMessage::parse("HOST_ENDED"), None);
    }
}
