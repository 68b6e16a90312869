use uuid::{Uuid, Variant};

use crate::error::RelayError;

pub const MAX_CONTENT_CHARS: usize = 1000;
pub const MIN_CONTENT_CHARS: usize = 1;

/// Accepts only hyphenated 8-4-4-4-12 UUIDs with a version nibble of 1..=5 and
/// the RFC 4122 variant.
pub fn validate_identity(id: &str) -> Result<(), RelayError> {
    // Uuid::try_parse also takes the simple, braced and urn forms
    if id.len() != 36 {
        return Err(RelayError::InvalidIdentity(id.to_owned()));
    }

    let Ok(uuid) = Uuid::try_parse(id) else {
        return Err(RelayError::InvalidIdentity(id.to_owned()));
    };

    let version_ok = matches!(uuid.get_version_num(), 1..=5);
    if !version_ok || uuid.get_variant() != Variant::RFC4122 {
        return Err(RelayError::InvalidIdentity(id.to_owned()));
    }

    Ok(())
}

/// Content is stored as given; trimming only decides emptiness.
pub fn validate_content(text: &str) -> Result<(), RelayError> {
    if text.trim().is_empty() {
        return Err(RelayError::EmptyContent);
    }

    let chars = text.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(RelayError::ContentTooLong { len: chars, max: MAX_CONTENT_CHARS });
    }
    if chars < MIN_CONTENT_CHARS {
        return Err(RelayError::EmptyContent);
    }

    Ok(())
}

pub fn validate_participants(user_a: &str, user_b: &str) -> Result<(), RelayError> {
    if user_a == user_b {
        return Err(RelayError::SameParticipant);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_v4_and_v7_identities() {
        assert!(validate_identity(&Uuid::new_v4().to_string()).is_ok());
        assert!(validate_identity("6fa459ea-ee8a-3ca4-894e-db77e160355e").is_ok());
        assert!(validate_identity("6FA459EA-EE8A-3CA4-894E-DB77E160355E").is_ok());
    }

    #[test]
    fn rejects_malformed_identities() {
        for id in [
            "",
            "not-a-uuid",
            "6fa459eaee8a3ca4894edb77e160355e",
            "{6fa459ea-ee8a-3ca4-894e-db77e160355e}",
            "6fa459ea-ee8a-3ca4-894e-db77e160355",
            "6fa459ea-ee8a-3ca4-894e-db77e160355g",
        ] {
            assert!(
                matches!(validate_identity(id), Err(RelayError::InvalidIdentity(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_bad_version_or_variant() {
        // version 0
        assert!(validate_identity("6fa459ea-ee8a-0ca4-894e-db77e160355e").is_err());
        // version 7 is outside 1..=5
        assert!(validate_identity(&Uuid::now_v7().to_string()).is_err());
        // variant nibble c is Microsoft, not RFC 4122
        assert!(validate_identity("6fa459ea-ee8a-3ca4-c94e-db77e160355e").is_err());
        assert!(validate_identity("00000000-0000-0000-0000-000000000000").is_err());
    }

    #[test]
    fn content_bounds_count_scalar_values() {
        assert!(validate_content("hi").is_ok());
        assert!(validate_content(&"é".repeat(MAX_CONTENT_CHARS)).is_ok());
        assert!(matches!(
            validate_content(&"é".repeat(MAX_CONTENT_CHARS + 1)),
            Err(RelayError::ContentTooLong { len: 1001, max: 1000 })
        ));
    }

    #[test]
    fn whitespace_only_content_is_empty() {
        for text in ["", " ", "\n\t  ", "\u{3000}"] {
            assert!(matches!(validate_content(text), Err(RelayError::EmptyContent)));
        }
        assert!(validate_content("  padded  ").is_ok());
    }

    #[test]
    fn participants_must_differ() {
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        assert!(validate_participants(&a, &b).is_ok());
        assert!(matches!(validate_participants(&a, &a), Err(RelayError::SameParticipant)));
    }
}
