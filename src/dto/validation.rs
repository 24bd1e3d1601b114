//! Validation helpers for DTOs.

use validator::ValidationError;

/// Shortest join code accepted once normalised.
pub const MIN_GAME_CODE_LEN: usize = 4;
/// Longest join code accepted once normalised.
pub const MAX_GAME_CODE_LEN: usize = 12;

/// Normalise a join code: trim, uppercase, and drop everything outside `[A-Z0-9]`.
///
/// ```ignore
/// normalize_game_code(" pub-42 ") // "PUB42"
/// ```
pub fn normalize_game_code(input: &str) -> String {
    input
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Validates that a join code keeps between 4 and 12 characters once normalised.
pub fn validate_game_code(code: &str) -> Result<(), ValidationError> {
    let normalized = normalize_game_code(code);
    if normalized.len() < MIN_GAME_CODE_LEN {
        let mut err = ValidationError::new("game_code_length");
        err.message = Some(
            format!("Game code must be at least {MIN_GAME_CODE_LEN} characters").into(),
        );
        return Err(err);
    }

    if normalized.len() > MAX_GAME_CODE_LEN {
        let mut err = ValidationError::new("game_code_length");
        err.message = Some(
            format!("Game code must be at most {MAX_GAME_CODE_LEN} characters").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a text field is not blank once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_game_code() {
        assert_eq!(normalize_game_code(" pub-42 "), "PUB42");
        assert_eq!(normalize_game_code("abcd"), "ABCD");
        assert_eq!(normalize_game_code("é!?"), "");
    }

    #[test]
    fn test_validate_game_code() {
        assert!(validate_game_code("pub42").is_ok());
        assert!(validate_game_code("a-b-c-d").is_ok());
        assert!(validate_game_code("ab!").is_err()); // too short once normalised
        assert!(validate_game_code("ABCDEFGHIJKLM").is_err()); // too long
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Ada").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
