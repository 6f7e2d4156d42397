//! Cross-PKG attestation over a round's commitment set.
//!
//! Every PKG in a fleet signs the *same* byte string covering every PKG's
//! commitment for the round, so a coordinator cannot show different peer
//! sets to different PKGs. The message layout is fixed:
//!
//! ```text
//! "Commitments" || u32_be(round) || Σ (hex_key_ascii || commitment_bytes)
//! ```
//!
//! with entries ordered by ascending lexicographic order of the lowercase
//! hex key string. Both signer and verifier must produce identical bytes;
//! the `BTreeMap` argument makes the ordering part of the type.

use std::collections::BTreeMap;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use sotto_types::Round;

use crate::error::CryptoError;

/// Literal prefix of every attestation message.
const ATTESTATION_PREFIX: &[u8] = b"Commitments";

/// Build the canonical attestation message for a round.
pub fn attestation_message(round: Round, commitments: &BTreeMap<String, Vec<u8>>) -> Vec<u8> {
    let mut message = Vec::with_capacity(
        ATTESTATION_PREFIX.len()
            + 4
            + commitments
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>(),
    );
    message.extend_from_slice(ATTESTATION_PREFIX);
    message.extend_from_slice(&round.to_be_bytes());
    for (hex_key, commitment) in commitments {
        message.extend_from_slice(hex_key.as_bytes());
        message.extend_from_slice(commitment);
    }
    message
}

/// Sign an attestation message with a PKG's long-term key.
pub fn sign_attestation(key: &SigningKey, message: &[u8]) -> [u8; 64] {
    key.sign(message).to_bytes()
}

/// Verify an attestation signature against a PKG's public key.
pub fn verify_attestation(
    public_key: &[u8; 32],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let key =
        VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidSignatureData)?;
    let signature =
        Signature::from_slice(signature).map_err(|_| CryptoError::InvalidSignatureData)?;
    Ok(key.verify(message, &signature).is_ok())
}
