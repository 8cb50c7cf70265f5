//! # Credential Shape Validation
//!
//! The `Authorization` header carries `Bearer <opaque-token>`. This module
//! only checks the shape; resolving the token to a user is the caller's job.
//!
//! ```text
//! (absent)                 → anonymous
//! Bearer 3f9a0c1e77b2d4aa  → token "3f9a0c1e77b2d4aa"
//! Bearer short             → MalformedCredential (token must exceed 8 chars)
//! Basic dXNlcjpwYXNz       → MalformedCredential
//! ```

use thiserror::Error;

/// The fixed authorization scheme literal.
pub const SCHEME: &str = "Bearer";

/// Tokens must be strictly longer than this many characters.
pub const MIN_TOKEN_LEN_EXCLUSIVE: usize = 8;

/// Failure to turn a raw credential into a principal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Header present but not of the form `Bearer <token>`.
    #[error("malformed credential: {0}")]
    MalformedCredential(&'static str),

    /// Well-formed token that matches no stored identity.
    #[error("credential does not match any user")]
    UnknownCredential,
}

/// An opaque bearer token that passed shape validation.
///
/// Custom `Debug` redacts the value to prevent credential leakage in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Validate the shape of a raw `Authorization` header value.
///
/// Returns `Ok(None)` when the header is absent or blank. Absence is an
/// anonymous caller, not an error.
pub fn parse_credential(raw: Option<&str>) -> Result<Option<BearerToken>, CredentialError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let mut parts = raw.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CredentialError::MalformedCredential(
            "expected exactly two whitespace-separated parts",
        ));
    };

    if scheme != SCHEME {
        return Err(CredentialError::MalformedCredential(
            "authorization header must use the Bearer scheme",
        ));
    }
    if token.chars().count() <= MIN_TOKEN_LEN_EXCLUSIVE {
        return Err(CredentialError::MalformedCredential("token is too short"));
    }

    Ok(Some(BearerToken(token.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_blank_is_anonymous() {
        assert_eq!(parse_credential(None), Ok(None));
        assert_eq!(parse_credential(Some("")), Ok(None));
        assert_eq!(parse_credential(Some("   ")), Ok(None));
    }

    #[test]
    fn well_formed_token_accepted() {
        let token = parse_credential(Some("Bearer abcdefghij")).unwrap().unwrap();
        assert_eq!(token.as_str(), "abcdefghij");
    }

    #[test]
    fn token_length_boundary() {
        assert!(parse_credential(Some("Bearer 12345678")).is_err());
        assert!(parse_credential(Some("Bearer 123456789")).unwrap().is_some());
    }

    #[test]
    fn wrong_scheme_rejected() {
        assert!(matches!(
            parse_credential(Some("Basic abcdefghijkl")),
            Err(CredentialError::MalformedCredential(_))
        ));
        assert!(parse_credential(Some("bearer abcdefghijkl")).is_err());
    }

    #[test]
    fn wrong_part_count_rejected() {
        assert!(parse_credential(Some("Bearer")).is_err());
        assert!(parse_credential(Some("abcdefghijkl")).is_err());
        assert!(parse_credential(Some("Bearer abcdefghij extra")).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let token = parse_credential(Some("Bearer supersecretvalue")).unwrap().unwrap();
        let shown = format!("{token:?}");
        assert!(!shown.contains("supersecret"));
        assert!(shown.contains("REDACTED"));
    }
}
