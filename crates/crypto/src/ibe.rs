//! Identity-Based Encryption using BLS12-381 pairings.
//!
//! Boneh–Franklin IBE in the BasicIdent shape, with AES-256-GCM as the
//! data-encapsulation layer:
//!
//! * **Setup**: master secret s, master public key MPK = s·G2.
//! * **Extract**: for identity `id`, the private key is σ = s·H1(id) ∈ G1.
//! * **Encrypt** to `id`: sample r, send U = r·G2 together with the payload
//!   sealed under a key derived from e(H1(id), MPK)^r.
//! * **Decrypt** with σ: the same key falls out of e(σ, U).
//!
//! Extraction is a pure function of `(s, id)`, so repeated extractions
//! return byte-identical keys.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use group::Curve;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use sha2_09::Sha256 as Sha256Compat;

use sotto_types::{G1Point, G2Point, IbeCiphertext, Identity, MasterPublicKey};

use crate::error::CryptoError;

/// Domain separation tag for hashing identities into G1.
const H1_DST: &[u8] = b"SOTTO-PKG-V01-BLS12381G1_XMD:SHA-256_SSWU_RO_IDENTITY";

/// HKDF info string for the DEM key.
const KEY_INFO: &[u8] = b"sotto-ibe-key";

/// A round's IBE master secret. Never serialized; round state is volatile.
#[derive(Clone)]
pub struct MasterPrivateKey(Scalar);

impl std::fmt::Debug for MasterPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterPrivateKey([REDACTED])")
    }
}

/// Generate a fresh IBE master key pair.
pub fn setup<R: RngCore + CryptoRng>(rng: &mut R) -> (MasterPublicKey, MasterPrivateKey) {
    let s = random_scalar(rng);
    let mpk = (G2Projective::generator() * s).to_affine();
    (G2Point(mpk.to_compressed()), MasterPrivateKey(s))
}

/// Derive the private key for an identity: σ = s·H1(id).
pub fn extract(msk: &MasterPrivateKey, identity: &Identity) -> G1Point {
    let id_hash = hash_to_g1(identity.as_ref());
    let sigma = (id_hash * msk.0).to_affine();
    G1Point(sigma.to_compressed())
}

/// Check an extracted key against the master public key.
///
/// Accepts iff e(σ, G2) = e(H1(id), MPK); a client runs this before
/// trusting a key handed back by a PKG.
pub fn verify_identity_key(
    mpk: &MasterPublicKey,
    identity: &Identity,
    key: &G1Point,
) -> Result<bool, CryptoError> {
    let sigma = decompress_g1(&key.0)?;
    let mpk = decompress_g2(&mpk.0)?;
    let id_hash = hash_to_g1(identity.as_ref()).to_affine();

    let lhs = pairing(&sigma, &G2Affine::generator());
    let rhs = pairing(&id_hash, &mpk);
    Ok(lhs == rhs)
}

/// Encrypt a message to an identity under a round's master public key.
pub fn encrypt<R: RngCore + CryptoRng>(
    mpk: &MasterPublicKey,
    identity: &Identity,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<IbeCiphertext, CryptoError> {
    let mpk_affine = decompress_g2(&mpk.0)?;

    let id_hash = hash_to_g1(identity.as_ref());
    let r = random_scalar(rng);

    // Ephemeral key U = r·G2.
    let u = (G2Projective::generator() * r).to_affine();

    // Shared secret e(H1(id), MPK)^r, computed as e(r·H1(id), MPK).
    let r_id_hash = (id_hash * r).to_affine();
    let shared = pairing(&r_id_hash, &mpk_affine);
    let key = derive_key(&shared)?;

    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    // AES-GCM appends the 16-byte tag; split it back out.
    let tag_start = sealed.len() - 16;
    let mut tag = [0u8; 16];
    tag.copy_from_slice(&sealed[tag_start..]);

    Ok(IbeCiphertext {
        ephemeral_pubkey: G2Point(u.to_compressed()),
        ciphertext: sealed[..tag_start].to_vec(),
        tag,
        nonce: nonce_bytes,
    })
}

/// Decrypt a ciphertext with an extracted identity key.
pub fn decrypt(key: &G1Point, ciphertext: &IbeCiphertext) -> Result<Vec<u8>, CryptoError> {
    let sigma = decompress_g1(&key.0)?;
    let u = decompress_g2(&ciphertext.ephemeral_pubkey.0)?;

    // e(σ, U) = e(s·H1(id), r·G2) = e(H1(id), MPK)^r.
    let shared = pairing(&sigma, &u);
    let dem_key = derive_key(&shared)?;

    let cipher = Aes256Gcm::new_from_slice(&dem_key)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let mut sealed = ciphertext.ciphertext.clone();
    sealed.extend_from_slice(&ciphertext.tag);

    cipher
        .decrypt(Nonce::from_slice(&ciphertext.nonce), sealed.as_ref())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Hash arbitrary data to G1 with the RFC 9380 simplified SWU map.
pub fn hash_to_g1(data: &[u8]) -> G1Projective {
    <G1Projective as HashToCurve<ExpandMsgXmd<Sha256Compat>>>::hash_to_curve(data, H1_DST)
}

/// Sample a uniformly random scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    Scalar::from_bytes_wide(&wide)
}

/// Derive the 32-byte DEM key from a pairing output.
///
/// Gt has no public canonical encoding in this curve crate, so the stable
/// debug rendering is hashed first; only stability matters here, both sides
/// derive from the same Gt value.
fn derive_key(shared: &bls12_381::Gt) -> Result<[u8; 32], CryptoError> {
    let gt_digest = Sha256::digest(format!("{shared:?}").as_bytes());

    let hk = Hkdf::<Sha256>::new(None, &gt_digest);
    let mut key = [0u8; 32];
    hk.expand(KEY_INFO, &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(key)
}

/// Decompress a G1 point from its 48-byte encoding.
pub fn decompress_g1(bytes: &[u8; 48]) -> Result<G1Affine, CryptoError> {
    Option::from(G1Affine::from_compressed(bytes)).ok_or(CryptoError::InvalidG1Point)
}

/// Decompress a G2 point from its 96-byte encoding.
pub fn decompress_g2(bytes: &[u8; 96]) -> Result<G2Affine, CryptoError> {
    Option::from(G2Affine::from_compressed(bytes)).ok_or(CryptoError::InvalidG2Point)
}
