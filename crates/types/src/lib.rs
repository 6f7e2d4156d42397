//! Core type definitions for the sotto private key generator.
//!
//! This crate provides the data structures shared between the PKG server,
//! the coordinator client, and user clients: curve point encodings, the
//! username/identity codec, persistent user records, registration tokens,
//! and the wire request/reply types.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

pub mod error;
pub mod identity;
pub mod token;
pub mod user;
pub mod wire;

pub use error::ErrorCode;
pub use identity::{validate_username, Identity, IDENTITY_LEN};
pub use token::{parse_token_from_email, RegToken};
pub use user::{UserEvent, UserEventKind, UserRecord};

/// Round numbers are 32-bit epoch counters.
pub type Round = u32;

/// Size of a long-term Ed25519 signing public key.
pub const SIGNING_KEY_LEN: usize = 32;

/// Size of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Size of a round commitment (SHA-512/256 output).
pub const COMMITMENT_LEN: usize = 32;

/// Name of the header through which the mutually-authenticated transport
/// forwards the verified peer certificate (base64 DER) to the HTTP layer.
pub const CLIENT_CERT_HEADER: &str = "x-client-cert";

// =========================
// CRYPTOGRAPHIC PRIMITIVES
// =========================

/// Compressed G1 point on BLS12-381 (48 bytes)
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct G1Point(#[serde_as(as = "[_; 48]")] pub [u8; 48]);

impl Default for G1Point {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

/// Compressed G2 point on BLS12-381 (96 bytes)
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct G2Point(#[serde_as(as = "[_; 96]")] pub [u8; 96]);

impl Default for G2Point {
    fn default() -> Self {
        Self([0u8; 96])
    }
}

/// IBE master public key for one round: MPK = s·G2.
pub type MasterPublicKey = G2Point;

/// Per-identity IBE private key: sk_id = s·H1(identity).
pub type IdentityPrivateKey = G1Point;

/// Round BLS public key (consumed by the mix-net layers downstream).
pub type BlsPublicKey = G2Point;

/// A PKG's public coordinates: its long-term signing key and base URL.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicServerConfig {
    #[serde(rename = "Key")]
    #[serde_as(as = "[_; 32]")]
    pub key: [u8; SIGNING_KEY_LEN],
    #[serde(rename = "Address")]
    pub address: String,
}

/// IBE ciphertext: ephemeral key plus an AEAD payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IbeCiphertext {
    /// Ephemeral public key: U = r·G2
    pub ephemeral_pubkey: G2Point,

    /// AES-256-GCM payload, key derived from the pairing
    pub ciphertext: Vec<u8>,

    /// Authentication tag
    pub tag: [u8; 16],

    /// Nonce for AEAD
    pub nonce: [u8; 12],
}
