//! Round BLS key pairs.
//!
//! Each round the PKG generates a BLS key pair alongside the IBE master
//! keys; the public key is bound into the round commitment and consumed by
//! the mix-net layers downstream. Minimal-signature form: public keys in
//! G2, signatures in G1.

use bls12_381::{pairing, G2Affine, G2Projective, Scalar};
use group::Curve;
use rand::{CryptoRng, RngCore};

use sotto_types::{BlsPublicKey, G1Point, G2Point};

use crate::error::CryptoError;
use crate::ibe::{decompress_g1, decompress_g2, hash_to_g1, random_scalar};

/// A round's BLS secret key. Never serialized; round state is volatile.
#[derive(Clone)]
pub struct BlsPrivateKey(Scalar);

impl std::fmt::Debug for BlsPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlsPrivateKey([REDACTED])")
    }
}

/// Generate a fresh BLS key pair.
pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> (BlsPublicKey, BlsPrivateKey) {
    let sk = random_scalar(rng);
    let pk = (G2Projective::generator() * sk).to_affine();
    (G2Point(pk.to_compressed()), BlsPrivateKey(sk))
}

/// Sign a message: σ = sk·H1(m).
pub fn sign(sk: &BlsPrivateKey, message: &[u8]) -> G1Point {
    let sig = (hash_to_g1(message) * sk.0).to_affine();
    G1Point(sig.to_compressed())
}

/// Verify a signature: e(σ, G2) = e(H1(m), pk).
pub fn verify(pk: &BlsPublicKey, message: &[u8], signature: &G1Point) -> Result<bool, CryptoError> {
    let pk = decompress_g2(&pk.0)?;
    let sig = decompress_g1(&signature.0)?;
    let msg_hash = hash_to_g1(message).to_affine();

    Ok(pairing(&sig, &G2Affine::generator()) == pairing(&msg_hash, &pk))
}
