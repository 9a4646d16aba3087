//! Common code for lancall
//!
//! Shared between the engine and any front end: the control message
//! grammar, PCM frame math (volume and loudness metering), and input
//! validators. Everything here is pure and carries no I/O.

pub mod frame;
pub mod protocol;
pub mod validators;

/// TCP port for the join handshake and the audio stream that follows it
pub const DEFAULT_SESSION_PORT: u16 = 50007;

/// UDP port for room discovery broadcasts
pub const DEFAULT_DISCOVERY_PORT: u16 = 50008;

/// UDP port for membership snapshot broadcasts
pub const DEFAULT_PRESENCE_PORT: u16 = 50009;

/// UDP port for chat broadcasts
pub const DEFAULT_CHAT_PORT: u16 = 50010;
