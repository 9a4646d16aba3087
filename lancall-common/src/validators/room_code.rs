//! Room code generation and validation
//!
//! A room code is 24 random alphanumerics generated when a room is
//! created. The random source is not cryptographic: the code avoids
//! casual collisions on a LAN, it is not a security boundary.

use std::fmt;

use rand::RngExt;
use rand::distr::Alphanumeric;

/// Exact length of a room code in characters
pub const ROOM_CODE_LENGTH: usize = 24;

/// Validation error for room codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomCodeError {
    /// Code is not exactly [`ROOM_CODE_LENGTH`] characters
    WrongLength,
    /// Code contains a non-alphanumeric character
    InvalidCharacters,
}

impl fmt::Display for RoomCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomCodeError::WrongLength => {
                write!(f, "room code must be exactly {} characters", ROOM_CODE_LENGTH)
            }
            RoomCodeError::InvalidCharacters => {
                f.write_str("room code may only contain letters and digits")
            }
        }
    }
}

/// Generate a fresh room code
pub fn generate_room_code() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(ROOM_CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Validate a room code entered by a joining user
pub fn validate_room_code(code: &str) -> Result<(), RoomCodeError> {
    if code.chars().count() != ROOM_CODE_LENGTH {
        return Err(RoomCodeError::WrongLength);
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RoomCodeError::InvalidCharacters);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_validate() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(validate_room_code(&code).is_ok());
        }
    }

    #[test]
    fn test_generated_codes_differ() {
        // Not a randomness test, just a sanity check that the source
        // is not returning a constant.
        let a = generate_room_code();
        let b = generate_room_code();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(validate_room_code(""), Err(RoomCodeError::WrongLength));
        assert_eq!(
            validate_room_code(&"a".repeat(ROOM_CODE_LENGTH - 1)),
            Err(RoomCodeError::WrongLength)
        );
        assert_eq!(
            validate_room_code(&"a".repeat(ROOM_CODE_LENGTH + 1)),
            Err(RoomCodeError::WrongLength)
        );
    }

    #[test]
    fn test_invalid_characters() {
        let mut code = "a".repeat(ROOM_CODE_LENGTH - 1);
        code.push('!');
        assert_eq!(
            validate_room_code(&code),
            Err(RoomCodeError::InvalidCharacters)
        );
    }
}
