//! Cryptographic primitives for the sotto private key generator.
//!
//! This crate implements the algebra the PKG round protocol is built on:
//!
//! 1. **IBE (Boneh–Franklin over BLS12-381)**: each round has a master key
//!    pair; the PKG extracts per-identity private keys, and anyone holding
//!    the master public key can encrypt to an identity.
//!
//! 2. **Round BLS keys**: a second key pair generated per round and bound
//!    into the round commitment; consumed by the mix-net layers downstream.
//!
//! 3. **Commitments and attestation**: the SHA-512/256 binding of a round's
//!    public keys, and the Ed25519-signed attestation over the full
//!    commitment set of a PKG fleet.
//!
//! 4. **Certificate binding**: self-signed certificates carrying an Ed25519
//!    signing key, the 1:1 binding the mutually-authenticated transport
//!    relies on.

pub mod attestation;
pub mod bls;
pub mod cert;
pub mod commitment;
pub mod error;
pub mod ibe;

pub use attestation::{attestation_message, sign_attestation, verify_attestation};
pub use commitment::commit_to;
pub use error::CryptoError;
