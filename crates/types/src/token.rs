//! Registration tokens and the verification-email format.
//!
//! A token is 32 bytes of fresh randomness, carried as lowercase hex. The
//! email body embeds the token after a fixed marker line so that clients
//! can recover it mechanically from a delivered message.

use rand::{CryptoRng, RngCore};

/// Marker line preceding the token in a verification email.
const TOKEN_MARKER: &str = "Your verification token is:";

/// Number of random bytes in a token.
pub const TOKEN_LEN: usize = 32;

/// A registration token, handed to the user out-of-band via email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegToken(pub [u8; TOKEN_LEN]);

impl RegToken {
    /// Mint a fresh token from a cryptographically strong source.
    pub fn mint<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; TOKEN_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Lowercase hex form, the shape that travels in email and requests.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for RegToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compose the plain-text body of a verification email.
pub fn verification_email_body(
    username: &str,
    token: &RegToken,
    pkg_index: u32,
    num_pkgs: u32,
) -> String {
    format!(
        "You are receiving this message to verify {username} with key server \
         {pkg_index} of {num_pkgs}.\n\n{TOKEN_MARKER}\n\n{token}\n\nIf you did \
         not request this, you can ignore this message.\n"
    )
}

/// Recover the token from a delivered email body.
///
/// Scans for the marker line and returns the first non-empty line after it.
/// Returns `None` if the marker is absent or the token line does not look
/// like a token.
pub fn parse_token_from_email(data: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    let mut lines = text.lines();
    lines.find(|line| line.trim() == TOKEN_MARKER)?;
    let token = lines.map(str::trim).find(|line| !line.is_empty())?;
    if token.len() != TOKEN_LEN * 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_token_email_roundtrip() {
        let token = RegToken::mint(&mut OsRng);
        let body = verification_email_body("alice@example.com", &token, 1, 3);
        let parsed = parse_token_from_email(body.as_bytes()).expect("token not found");
        assert_eq!(parsed, token.to_hex());
    }

    #[test]
    fn test_parse_rejects_missing_marker() {
        assert_eq!(parse_token_from_email(b"no token here"), None);
    }

    #[test]
    fn test_parse_rejects_mangled_token() {
        let body = format!("{TOKEN_MARKER}\n\nnot-a-token\n");
        assert_eq!(parse_token_from_email(body.as_bytes()), None);
    }

    #[test]
    fn test_tokens_are_distinct() {
        let a = RegToken::mint(&mut OsRng);
        let b = RegToken::mint(&mut OsRng);
        assert_ne!(a, b);
    }
}
