//! # Primitives
//!
//! Hard limits enforced by the core. Every collection a client can grow is
//! bounded here.

/// Maximum length of a user or group name, in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Maximum length of an expense description, in bytes.
pub const MAX_DESCRIPTION_LEN: usize = 512;

/// Maximum number of members in one group.
pub const MAX_GROUP_MEMBERS: usize = 64;

/// Largest single expense total accepted, in cents (ten million units).
pub const MAX_EXPENSE_CENTS: i64 = 1_000_000_000;

/// Validate a display name, returning it trimmed.
pub fn validate_name(name: &str) -> crate::Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_NAME_LEN {
        return Err(crate::SpliitzError::InvalidName(format!(
            "name length {} out of valid range 1..={}",
            trimmed.len(),
            MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        assert_eq!(validate_name("  Alice ").ok(), Some("Alice".to_string()));
    }

    #[test]
    fn blank_and_oversized_names_rejected() {
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
