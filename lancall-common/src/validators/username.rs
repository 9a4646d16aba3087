//! Username validation
//!
//! Usernames are display names, unique within a room instance. They
//! travel inside pipe-delimited control messages and roster lists, so
//! the protocol delimiters are forbidden.

use std::fmt;

/// Maximum length for usernames in characters
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Characters that would corrupt the wire grammar
const FORBIDDEN_CHARS: &[char] = &['|', ':', ','];

/// Validation error for usernames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameError {
    /// Username is empty
    Empty,
    /// Username exceeds maximum length
    TooLong,
    /// Username contains a protocol delimiter or control character
    InvalidCharacters,
}

impl fmt::Display for UsernameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsernameError::Empty => f.write_str("username cannot be empty"),
            UsernameError::TooLong => {
                write!(f, "username cannot exceed {} characters", MAX_USERNAME_LENGTH)
            }
            UsernameError::InvalidCharacters => {
                f.write_str("username cannot contain '|', ':', ',' or control characters")
            }
        }
    }
}

/// Validate a username
///
/// Checks:
/// - Not empty
/// - Does not exceed maximum length
/// - No `|`, `:` or `,` (message and roster delimiters)
/// - No control characters
///
/// Spaces and non-ASCII letters are allowed; this is a display name,
/// not an account identifier.
pub fn validate_username(username: &str) -> Result<(), UsernameError> {
    if username.is_empty() {
        return Err(UsernameError::Empty);
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(UsernameError::TooLong);
    }
    for ch in username.chars() {
        if FORBIDDEN_CHARS.contains(&ch) || ch.is_control() {
            return Err(UsernameError::InvalidCharacters);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("Alice Smith").is_ok());
        assert!(validate_username("bob_42").is_ok());
        assert!(validate_username("用户").is_ok());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH)).is_ok());
    }

    #[test]
    fn test_empty() {
        assert_eq!(validate_username(""), Err(UsernameError::Empty));
    }

    #[test]
    fn test_too_long() {
        assert_eq!(
            validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)),
            Err(UsernameError::TooLong)
        );
    }

    #[test]
    fn test_protocol_delimiters_rejected() {
        assert_eq!(
            validate_username("al|ice"),
            Err(UsernameError::InvalidCharacters)
        );
        assert_eq!(
            validate_username("al:ice"),
            Err(UsernameError::InvalidCharacters)
        );
        assert_eq!(
            validate_username("al,ice"),
            Err(UsernameError::InvalidCharacters)
        );
    }

    #[test]
    fn test_control_characters_rejected() {
        assert_eq!(
            validate_username("al\nice"),
            Err(UsernameError::InvalidCharacters)
        );
        assert_eq!(
            validate_username("al\0ice"),
            Err(UsernameError::InvalidCharacters)
        );
    }
}
