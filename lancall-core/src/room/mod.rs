//! Room state and lifecycle
//!
//! [`Roster`] is the serialized membership view; [`RoomController`]
//! is the actor that owns every state transition.

mod controller;
mod roster;

pub use controller::{RoomConfig, RoomController, RoomHandle};
pub use roster::Roster;
