//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_REASON_LENGTH: usize = 2_000;

/// Validates that a dispute reason carries actual text.
///
/// Whitespace-only reasons are rejected; an admin cannot arbitrate an empty
/// complaint.
pub fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().is_empty() {
        let mut err = ValidationError::new("reason_empty");
        err.message = Some("Dispute reason must not be empty".into());
        return Err(err);
    }

    if reason.len() > MAX_REASON_LENGTH {
        let mut err = ValidationError::new("reason_length");
        err.message = Some(
            format!(
                "Dispute reason must be at most {} characters (got {})",
                MAX_REASON_LENGTH,
                reason.len()
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_reason_valid() {
        assert!(validate_reason("score is wrong").is_ok());
        assert!(validate_reason("x").is_ok());
    }

    #[test]
    fn test_validate_reason_empty() {
        assert!(validate_reason("").is_err());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason("\n\t").is_err());
    }

    #[test]
    fn test_validate_reason_too_long() {
        let long = "a".repeat(MAX_REASON_LENGTH + 1);
        assert!(validate_reason(&long).is_err());
    }
}
