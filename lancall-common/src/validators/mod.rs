//! Input validation
//!
//! Validators for user-entered values that end up on the wire. Each
//! module exposes a `validate_*` function returning a small error enum.

mod room_code;
mod username;

pub use room_code::{ROOM_CODE_LENGTH, RoomCodeError, generate_room_code, validate_room_code};
pub use username::{MAX_USERNAME_LENGTH, UsernameError, validate_username};
