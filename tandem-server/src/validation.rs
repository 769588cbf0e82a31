//! Request validation module
//!
//! Room ids come straight from the URL path and are used as map keys and
//! log fields.

use crate::error::ApiError;

/// Longest accepted room id
pub const MAX_ROOM_ID_LEN: usize = 128;

/// Validates a relay room id: 1 to 128 characters from `[A-Za-z0-9_-]`.
pub fn validate_room_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() || id.len() > MAX_ROOM_ID_LEN {
        return Err(ApiError::bad_request(format!(
            "Room id must be 1 to {} characters",
            MAX_ROOM_ID_LEN
        )));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(ApiError::bad_request(
            "Room id may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_room_ids() {
        assert!(validate_room_id("a").is_ok());
        assert!(validate_room_id("3f2b9c1e-7a4d-4e8f-9b6a-1c2d3e4f5a6b").is_ok());
        assert!(validate_room_id("challenge_42").is_ok());
        assert!(validate_room_id(&"x".repeat(MAX_ROOM_ID_LEN)).is_ok());
    }

    #[test]
    fn test_invalid_room_ids() {
        assert!(validate_room_id("").is_err());
        assert!(validate_room_id(&"x".repeat(MAX_ROOM_ID_LEN + 1)).is_err());
        assert!(validate_room_id("../etc").is_err());
        assert!(validate_room_id("room id").is_err());
        assert!(validate_room_id("räum").is_err());
    }
}
