//! lancall engine
//!
//! The session and transport core for serverless LAN voice rooms:
//! UDP broadcast discovery, the TCP join handshake, presence and chat
//! broadcast channels, and the full-duplex raw PCM audio pipeline,
//! all orchestrated by the room lifecycle controller.
//!
//! The engine is presentation-agnostic. It emits [`Event`]s over a
//! channel and is driven through a [`RoomHandle`]; the bundled
//! `lancall` binary is one thin front end over that surface.

pub mod audio;
pub mod chat;
pub mod discovery;
pub mod events;
pub mod net;
pub mod presence;
pub mod room;
pub mod session;
pub mod settings;

pub use audio::SharedVolume;
pub use chat::{ChatLine, ChatLog};
pub use events::{Event, EventReceiver, EventSender};
pub use net::Ports;
pub use room::{RoomConfig, RoomController, RoomHandle};
