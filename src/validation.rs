//! Token grammar for package names, versions and digests.
//!
//! Every name or version that ends up as a path component is checked here
//! first. A name is `[a-z0-9][a-z0-9@_-]*`; a version is
//! `[a-zA-Z0-9][a-zA-Z0-9._-]*`. Neither can contain a separator, so
//! neither can climb out of the directory it is joined onto.

use thiserror::Error;

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid package name: {0:?}")]
    InvalidName(String),
    #[error("invalid version: {0:?}")]
    InvalidVersion(String),
    #[error("SHA256 must be 64 hex characters, got {0}")]
    DigestLength(usize),
    #[error("SHA256 contains non-hex character {0:?}")]
    DigestAlphabet(char),
}

pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '@' | '_' | '-'))
}

pub fn is_valid_version(version: &str) -> bool {
    let mut chars = version.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

pub fn validate_version(version: &str) -> Result<(), ValidationError> {
    if is_valid_version(version) {
        Ok(())
    } else {
        Err(ValidationError::InvalidVersion(version.to_string()))
    }
}

/// Check that `digest` is a 64-character hex string (either case).
pub fn validate_sha256(digest: &str) -> Result<(), ValidationError> {
    if digest.len() != SHA256_HEX_LEN {
        return Err(ValidationError::DigestLength(digest.len()));
    }
    if let Some(bad) = digest.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ValidationError::DigestAlphabet(bad));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["jq", "python@3", "lib_foo-2", "7zip"] {
            assert!(is_valid_name(name), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "Jq", "-jq", "../jq", "jq/evil", "j q", ".hidden", "jq.1"] {
            assert!(!is_valid_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_valid_versions() {
        for version in ["1.7", "1.7.1", "v2.0.0-rc1", "2024_01", "R13"] {
            assert!(is_valid_version(version), "{version} should be valid");
        }
    }

    #[test]
    fn test_invalid_versions() {
        for version in ["", ".1", "..", "../1.0", "1.0/../../x", "1 0", "-1"] {
            assert!(!is_valid_version(version), "{version:?} should be invalid");
        }
    }

    #[test]
    fn test_validate_name_error_carries_input() {
        let err = validate_name("Bad").unwrap_err();
        assert_eq!(err, ValidationError::InvalidName("Bad".to_string()));
        assert!(validate_version("1.0").is_ok());
        assert!(validate_version("/1.0").is_err());
    }

    #[test]
    fn test_validate_sha256() {
        let lower = "a".repeat(64);
        let mixed = format!("{}{}", "AbCdEf".repeat(10), "0123");
        assert!(validate_sha256(&lower).is_ok());
        assert!(validate_sha256(&mixed).is_ok());

        assert_eq!(
            validate_sha256("abc").unwrap_err(),
            ValidationError::DigestLength(3)
        );
        let bad = format!("{}z", "a".repeat(63));
        assert_eq!(
            validate_sha256(&bad).unwrap_err(),
            ValidationError::DigestAlphabet('z')
        );
    }
}
