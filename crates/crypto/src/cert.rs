//! Self-signed certificates bound 1:1 to Ed25519 signing keys.
//!
//! The PKG transport is mutually authenticated: each side presents a
//! self-signed X.509 certificate whose subject public key *is* its
//! long-term Ed25519 signing key. Hostname checks are replaced by
//! key-equality checks, so the only facts a certificate needs to establish
//! are (a) it carries an Ed25519 key and (b) it is self-signed by that key.
//!
//! `generate_self_signed` is used by clients to mint their certificate;
//! `peer_key_from_cert_der` is the server-side half, run on the certificate
//! the transport hands over.

use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use x509_parser::oid_registry::OID_SIG_ED25519;
use x509_parser::parse_x509_certificate;

use sotto_types::SIGNING_KEY_LEN;

use crate::error::CryptoError;

/// Mint a self-signed certificate (DER) for an Ed25519 signing key.
pub fn generate_self_signed(key: &SigningKey) -> Result<Vec<u8>, CryptoError> {
    let pkcs8 = key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::MalformedCertificate(e.to_string()))?;
    let key_pair = rcgen::KeyPair::try_from(pkcs8.as_bytes())
        .map_err(|e| CryptoError::MalformedCertificate(e.to_string()))?;

    let params = rcgen::CertificateParams::new(Vec::new())
        .map_err(|e| CryptoError::MalformedCertificate(e.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CryptoError::MalformedCertificate(e.to_string()))?;

    Ok(cert.der().to_vec())
}

/// Extract the Ed25519 signing key a peer certificate is bound to.
///
/// Parses the DER, requires an Ed25519 subject public key, and checks the
/// certificate's self-signature against that key before returning it.
pub fn peer_key_from_cert_der(der: &[u8]) -> Result<[u8; SIGNING_KEY_LEN], CryptoError> {
    let (_, cert) = parse_x509_certificate(der)
        .map_err(|e| CryptoError::MalformedCertificate(e.to_string()))?;

    let spki = cert.public_key();
    if spki.algorithm.algorithm != OID_SIG_ED25519 {
        return Err(CryptoError::UnsupportedCertificateKey);
    }
    let key_bytes: [u8; SIGNING_KEY_LEN] = spki
        .subject_public_key
        .data
        .as_ref()
        .try_into()
        .map_err(|_| CryptoError::UnsupportedCertificateKey)?;

    let key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| CryptoError::UnsupportedCertificateKey)?;
    let signature = Signature::from_slice(cert.signature_value.data.as_ref())
        .map_err(|_| CryptoError::CertificateSignatureInvalid)?;
    key.verify_strict(cert.tbs_certificate.as_ref(), &signature)
        .map_err(|_| CryptoError::CertificateSignatureInvalid)?;

    Ok(key_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_certificate_roundtrip() {
        let key = SigningKey::generate(&mut OsRng);
        let der = generate_self_signed(&key).unwrap();
        let extracted = peer_key_from_cert_der(&der).unwrap();
        assert_eq!(extracted, key.verifying_key().to_bytes());
    }

    #[test]
    fn test_garbage_der_rejected() {
        assert!(peer_key_from_cert_der(b"not a certificate").is_err());
    }

    #[test]
    fn test_truncated_der_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let der = generate_self_signed(&key).unwrap();
        assert!(peer_key_from_cert_der(&der[..der.len() / 2]).is_err());
    }

    #[test]
    fn test_corrupted_signature_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let mut der = generate_self_signed(&key).unwrap();
        // The signature lives at the tail of the certificate.
        let last = der.len() - 1;
        der[last] ^= 0xff;
        assert!(peer_key_from_cert_der(&der).is_err());
    }
}
