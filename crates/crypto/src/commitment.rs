//! Round key commitments.
//!
//! During the commit phase a PKG binds itself to the round's public keys by
//! publishing `SHA-512/256(mpk || bls_pk)` over the canonical compressed
//! encodings. The reveal phase later checks the coordinator echoed exactly
//! this value back.

use sha2::{Digest, Sha512_256};

use sotto_types::{BlsPublicKey, MasterPublicKey, COMMITMENT_LEN};

/// Commit to a round's master public key and BLS public key.
pub fn commit_to(mpk: &MasterPublicKey, bls_pk: &BlsPublicKey) -> [u8; COMMITMENT_LEN] {
    let mut hasher = Sha512_256::new();
    hasher.update(mpk.0);
    hasher.update(bls_pk.0);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    use crate::{bls, ibe};

    #[test]
    fn test_commitment_is_stable() {
        let (mpk, _) = ibe::setup(&mut OsRng);
        let (bls_pk, _) = bls::generate(&mut OsRng);
        assert_eq!(commit_to(&mpk, &bls_pk), commit_to(&mpk, &bls_pk));
    }

    #[test]
    fn test_commitment_binds_both_keys() {
        let (mpk, _) = ibe::setup(&mut OsRng);
        let (other_mpk, _) = ibe::setup(&mut OsRng);
        let (bls_pk, _) = bls::generate(&mut OsRng);
        let (other_bls_pk, _) = bls::generate(&mut OsRng);

        let base = commit_to(&mpk, &bls_pk);
        assert_ne!(base, commit_to(&other_mpk, &bls_pk));
        assert_ne!(base, commit_to(&mpk, &other_bls_pk));
    }

    #[test]
    fn test_commitment_length() {
        let (mpk, _) = ibe::setup(&mut OsRng);
        let (bls_pk, _) = bls::generate(&mut OsRng);
        assert_eq!(commit_to(&mpk, &bls_pk).len(), COMMITMENT_LEN);
    }
}
