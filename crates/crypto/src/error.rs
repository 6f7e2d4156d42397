//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid G1 point encoding")]
    InvalidG1Point,

    #[error("Invalid G2 point encoding")]
    InvalidG2Point,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Ciphertext authentication failed")]
    AuthenticationFailed,

    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("Invalid Ed25519 key or signature encoding")]
    InvalidSignatureData,

    #[error("Certificate is not parseable X.509: {0}")]
    MalformedCertificate(String),

    #[error("Certificate does not carry an Ed25519 subject key")]
    UnsupportedCertificateKey,

    #[error("Certificate self-signature check failed")]
    CertificateSignatureInvalid,
}
