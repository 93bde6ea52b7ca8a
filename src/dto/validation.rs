//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_ID_LEN: usize = 64;

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Checks a slug-like identifier: 1 to 64 ASCII letters, digits, `-` or `_`.
///
/// Used for room, user and album ids, which end up inside storage keys.
///
/// ```ignore
/// validate_slug("main")          // Ok
/// validate_slug("abbey-road")    // Ok
/// validate_slug("room::main")    // Err - separator characters
/// ```
pub fn validate_slug(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(error(
            "id_length",
            format!("Identifier must be 1 to {MAX_ID_LEN} characters (got {})", id.len()),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(error(
            "id_format",
            "Identifier may only contain ASCII letters, digits, `-` and `_`".into(),
        ));
    }

    Ok(())
}

/// Display names are 1 to 32 characters once trimmed.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let count = name.trim().chars().count();
    if !(1..=32).contains(&count) {
        return Err(error(
            "display_name_length",
            format!("Display name must be 1 to 32 characters (got {count})"),
        ));
    }
    Ok(())
}

/// Chat bodies are 1 to 500 characters once trimmed.
pub fn validate_message_body(body: &str) -> Result<(), ValidationError> {
    let count = body.trim().chars().count();
    if !(1..=500).contains(&count) {
        return Err(error(
            "body_length",
            format!("Message must be 1 to 500 characters (got {count})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert!(validate_slug("main").is_ok());
        assert!(validate_slug("mysticism-romance").is_ok());
        assert!(validate_slug("3f2b_user").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("room::main").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(validate_slug(&"a".repeat(65)).is_err());
    }

    #[test]
    fn display_names_are_trimmed_before_counting() {
        assert!(validate_display_name("  kev  ").is_ok());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"é".repeat(32)).is_ok());
        assert!(validate_display_name(&"é".repeat(33)).is_err());
    }

    #[test]
    fn message_bodies() {
        assert!(validate_message_body("what a drop").is_ok());
        assert!(validate_message_body("\n\t").is_err());
        assert!(validate_message_body(&"x".repeat(501)).is_err());
    }
}
