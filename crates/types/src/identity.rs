//! Username validation and the username ↔ identity codec.
//!
//! A username is an email-style address; a valid username maps bijectively
//! onto a fixed-width 64-byte identity by zero-padding. The identity is the
//! value actually fed to IBE extraction and used as the user-store key.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::ErrorCode;

/// Width of an identity in bytes. Also the maximum username length.
pub const IDENTITY_LEN: usize = 64;

/// Minimum username length in bytes.
pub const MIN_USERNAME_LEN: usize = 3;

/// Check that `username` is acceptable to the PKG.
///
/// A username is valid iff its length is within [3, 64] bytes, it contains
/// an `@`, and it equals its lowercased form. Nothing here checks that the
/// address is actually deliverable; that is the SMTP relay's problem.
pub fn validate_username(username: &str) -> Result<(), ErrorCode> {
    if username.len() < MIN_USERNAME_LEN {
        return Err(ErrorCode::InvalidUsername);
    }
    if username.len() > IDENTITY_LEN {
        return Err(ErrorCode::InvalidUsername);
    }
    if !username.contains('@') {
        return Err(ErrorCode::InvalidUsername);
    }
    if username != username.to_lowercase() {
        return Err(ErrorCode::InvalidUsername);
    }
    Ok(())
}

/// A 64-byte zero-padded identity derived from a valid username.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(#[serde_as(as = "[_; 64]")] pub [u8; IDENTITY_LEN]);

impl Identity {
    /// Convert a username to an identity, validating it first.
    pub fn from_username(username: &str) -> Result<Self, ErrorCode> {
        validate_username(username)?;
        Ok(Self::from_valid_username(username))
    }

    /// Convert a username that is already known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if the username is longer than [`IDENTITY_LEN`] bytes; by the
    /// validity rule no valid username is.
    pub fn from_valid_username(username: &str) -> Self {
        let bytes = username.as_bytes();
        assert!(bytes.len() <= IDENTITY_LEN, "username exceeds identity width");
        let mut id = [0u8; IDENTITY_LEN];
        id[..bytes.len()].copy_from_slice(bytes);
        Self(id)
    }

    /// Recover the username by scanning up to the first NUL byte.
    pub fn username(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(IDENTITY_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity({:?})", self.username())
    }
}

impl AsRef<[u8]> for Identity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("alice@example.com").is_ok());
        assert!(validate_username("a@b").is_ok());
        assert!(validate_username(&format!("{}@x.io", "a".repeat(59))).is_ok());
    }

    #[test]
    fn test_username_too_short() {
        assert_eq!(validate_username(""), Err(ErrorCode::InvalidUsername));
        assert_eq!(validate_username("a@"), Err(ErrorCode::InvalidUsername));
    }

    #[test]
    fn test_username_too_long() {
        let long = format!("{}@example.com", "a".repeat(60));
        assert!(long.len() > IDENTITY_LEN);
        assert_eq!(validate_username(&long), Err(ErrorCode::InvalidUsername));
    }

    #[test]
    fn test_username_requires_at_sign() {
        assert_eq!(validate_username("alice"), Err(ErrorCode::InvalidUsername));
    }

    #[test]
    fn test_username_must_be_lowercase() {
        assert_eq!(
            validate_username("Alice@example.com"),
            Err(ErrorCode::InvalidUsername)
        );
    }

    #[test]
    fn test_identity_roundtrip() {
        for name in ["alice@example.com", "a@b", "0thread3@example.com"] {
            let id = Identity::from_username(name).unwrap();
            assert_eq!(id.username(), name);
        }
    }

    #[test]
    fn test_identity_roundtrip_full_width() {
        // Exactly 64 bytes, no NUL: the round-trip must be exact.
        let name = format!("{}@{}", "a".repeat(31), "b".repeat(32));
        assert_eq!(name.len(), IDENTITY_LEN);
        let id = Identity::from_username(&name).unwrap();
        assert_eq!(id.username(), name);
    }

    #[test]
    fn test_identity_rejects_invalid() {
        assert!(Identity::from_username("nonexistent").is_err());
    }

    #[test]
    fn test_identity_zero_padding() {
        let id = Identity::from_valid_username("a@b");
        assert_eq!(&id.0[..3], b"a@b");
        assert!(id.0[3..].iter().all(|&b| b == 0));
    }
}
