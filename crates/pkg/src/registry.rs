//! Per-round key state and the commit/reveal engine.
//!
//! The registry owns every live round's key material behind one mutex.
//! Commit generates fresh keys (outside the lock, since key generation is
//! the expensive part) and publishes them with a double-checked insert so
//! racing commits converge on a single state. Reveal holds the lock for its
//! whole duration: it must observe and latch the attestation signature
//! exactly once, and it is rare enough that serializing it costs nothing.
//!
//! Round state never touches disk. A PKG that restarts forgets its rounds
//! and waits for the coordinator to reissue commit.

use std::collections::{BTreeMap, HashMap};

use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use tracing::debug;

use sotto_crypto::ibe::MasterPrivateKey;
use sotto_crypto::bls::BlsPrivateKey;
use sotto_crypto::{attestation, bls, commit_to, ibe};
use sotto_types::wire::RevealReply;
use sotto_types::{
    BlsPublicKey, ErrorCode, G1Point, Identity, MasterPublicKey, Round, COMMITMENT_LEN,
    SIGNATURE_LEN, SIGNING_KEY_LEN,
};

use crate::error::PkgError;

struct RoundState {
    ibe_pub: MasterPublicKey,
    ibe_priv: MasterPrivateKey,
    bls_pub: BlsPublicKey,
    bls_priv: BlsPrivateKey,
    reveal_signature: Option<[u8; SIGNATURE_LEN]>,
}

impl RoundState {
    fn fresh() -> Self {
        let mut rng = OsRng;
        let (ibe_pub, ibe_priv) = ibe::setup(&mut rng);
        let (bls_pub, bls_priv) = bls::generate(&mut rng);
        Self {
            ibe_pub,
            ibe_priv,
            bls_pub,
            bls_priv,
            reveal_signature: None,
        }
    }
}

/// Concurrent map round number → round state, with bounded retention.
#[derive(Default)]
pub struct RoundRegistry {
    rounds: Mutex<HashMap<Round, RoundState>>,
}

impl RoundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit to a round, creating its key state if necessary.
    ///
    /// Idempotent: repeated commits return the same commitment. Rounds older
    /// than `round - 1` are evicted on the way out.
    pub fn commit(&self, round: Round) -> [u8; COMMITMENT_LEN] {
        let cached = {
            let rounds = self.rounds.lock();
            rounds
                .get(&round)
                .map(|st| (st.ibe_pub.clone(), st.bls_pub.clone()))
        };

        let (ibe_pub, bls_pub) = match cached {
            Some(keys) => keys,
            None => {
                // Generate outside the lock; reconcile with any concurrent
                // winner when publishing.
                let fresh = RoundState::fresh();
                let mut rounds = self.rounds.lock();
                let st = rounds.entry(round).or_insert(fresh);
                (st.ibe_pub.clone(), st.bls_pub.clone())
            }
        };

        let evict_before = round.saturating_sub(1);
        let mut rounds = self.rounds.lock();
        rounds.retain(|&r, _| r >= evict_before);
        drop(rounds);

        commit_to(&ibe_pub, &bls_pub)
    }

    /// Reveal a round's public keys together with the attestation signature
    /// over the full commitment set.
    ///
    /// The signature is latched on first success; later reveals return it
    /// unchanged regardless of the supplied commitments.
    pub fn reveal(
        &self,
        round: Round,
        commitments: &HashMap<String, Vec<u8>>,
        signing_key: &SigningKey,
    ) -> Result<RevealReply, PkgError> {
        let mut rounds = self.rounds.lock();
        let st = rounds
            .get_mut(&round)
            .ok_or_else(|| PkgError::new(ErrorCode::RoundNotFound, format!("round {round}")))?;

        if st.reveal_signature.is_none() {
            let self_hex = hex::encode(signing_key.verifying_key().as_bytes());
            let expected = commit_to(&st.ibe_pub, &st.bls_pub);
            match commitments.get(&self_hex) {
                Some(supplied) if supplied.as_slice() == expected.as_slice() => {}
                _ => {
                    return Err(PkgError::bad_commitment(format!(
                        "unexpected commitment for key {self_hex}"
                    )))
                }
            }

            let mut canonical = BTreeMap::new();
            for (hex_key, commitment) in commitments {
                if hex_key.len() != 2 * SIGNING_KEY_LEN {
                    return Err(PkgError::bad_commitment(format!(
                        "bad public key length for hex key {hex_key}: {} != {}",
                        hex_key.len(),
                        2 * SIGNING_KEY_LEN
                    )));
                }
                if commitment.len() != COMMITMENT_LEN {
                    return Err(PkgError::bad_commitment(format!(
                        "bad commitment length for key {hex_key}: {} != {}",
                        commitment.len(),
                        COMMITMENT_LEN
                    )));
                }
                canonical.insert(hex_key.clone(), commitment.clone());
            }

            let message = attestation::attestation_message(round, &canonical);
            st.reveal_signature = Some(attestation::sign_attestation(signing_key, &message));
            debug!(round, peers = canonical.len(), "latched reveal signature");
        }

        match &st.reveal_signature {
            Some(signature) => Ok(RevealReply {
                master_public_key: st.ibe_pub.clone(),
                bls_public_key: st.bls_pub.clone(),
                signature: signature.to_vec(),
            }),
            None => Err(PkgError::internal("reveal signature missing after latch")),
        }
    }

    /// Sign a payload with a round's BLS key. The mix-net layers downstream
    /// verify against the BLS public key bound into the round commitment.
    pub fn bls_sign(&self, round: Round, message: &[u8]) -> Result<G1Point, PkgError> {
        let rounds = self.rounds.lock();
        let st = rounds
            .get(&round)
            .ok_or_else(|| PkgError::new(ErrorCode::RoundNotFound, format!("round {round}")))?;
        Ok(bls::sign(&st.bls_priv, message))
    }

    /// Extract the IBE private key for an identity at a round.
    pub fn extract(&self, round: Round, identity: &Identity) -> Result<G1Point, PkgError> {
        let rounds = self.rounds.lock();
        let st = rounds
            .get(&round)
            .ok_or_else(|| PkgError::new(ErrorCode::RoundNotFound, format!("round {round}")))?;
        Ok(ibe::extract(&st.ibe_priv, identity))
    }

    /// Whether a round is currently live. Used by tests and diagnostics.
    pub fn contains(&self, round: Round) -> bool {
        self.rounds.lock().contains_key(&round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn commitment_map(key: &SigningKey, commitment: [u8; 32]) -> HashMap<String, Vec<u8>> {
        let mut map = HashMap::new();
        map.insert(
            hex::encode(key.verifying_key().as_bytes()),
            commitment.to_vec(),
        );
        map
    }

    #[test]
    fn test_commit_idempotent() {
        let registry = RoundRegistry::new();
        let first = registry.commit(42);
        let second = registry.commit(42);
        assert_eq!(first, second);
    }

    #[test]
    fn test_commit_differs_across_rounds() {
        let registry = RoundRegistry::new();
        assert_ne!(registry.commit(41), registry.commit(42));
    }

    #[test]
    fn test_retention_bound() {
        let registry = RoundRegistry::new();
        registry.commit(10);
        registry.commit(11);
        registry.commit(12);
        assert!(!registry.contains(10));
        assert!(registry.contains(11));
        assert!(registry.contains(12));
    }

    #[test]
    fn test_retention_near_zero() {
        let registry = RoundRegistry::new();
        registry.commit(0);
        registry.commit(1);
        assert!(registry.contains(0));
        assert!(registry.contains(1));
    }

    #[test]
    fn test_reveal_without_commit() {
        let registry = RoundRegistry::new();
        let key = SigningKey::generate(&mut OsRng);
        let err = registry
            .reveal(7, &HashMap::new(), &key)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RoundNotFound);
    }

    #[test]
    fn test_reveal_rejects_wrong_self_commitment() {
        let registry = RoundRegistry::new();
        let key = SigningKey::generate(&mut OsRng);
        registry.commit(7);
        let err = registry
            .reveal(7, &commitment_map(&key, [0u8; 32]), &key)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadCommitment);
    }

    #[test]
    fn test_reveal_rejects_malformed_entries() {
        let registry = RoundRegistry::new();
        let key = SigningKey::generate(&mut OsRng);
        let commitment = registry.commit(7);

        let mut commitments = commitment_map(&key, commitment);
        commitments.insert("abc".into(), vec![0u8; 32]);
        let err = registry.reveal(7, &commitments, &key).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadCommitment);

        let mut commitments = commitment_map(&key, commitment);
        commitments.insert("cd".repeat(32), vec![0u8; 7]);
        let err = registry.reveal(7, &commitments, &key).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadCommitment);
    }

    #[test]
    fn test_reveal_signature_latches() {
        let registry = RoundRegistry::new();
        let key = SigningKey::generate(&mut OsRng);
        let commitment = registry.commit(7);

        let first = registry
            .reveal(7, &commitment_map(&key, commitment), &key)
            .unwrap();

        // A second reveal with a different (even invalid) commitment set
        // reuses the latched signature.
        let mut other = commitment_map(&key, commitment);
        other.insert("ab".repeat(32), vec![9u8; 32]);
        let second = registry.reveal(7, &other, &key).unwrap();

        assert_eq!(first.signature, second.signature);
        assert_eq!(first.master_public_key, second.master_public_key);
    }

    #[test]
    fn test_keys_stable_across_commits() {
        let registry = RoundRegistry::new();
        let key = SigningKey::generate(&mut OsRng);
        let commitment = registry.commit(7);
        let reveal = registry
            .reveal(7, &commitment_map(&key, commitment), &key)
            .unwrap();

        // Committing again must not regenerate the keys.
        registry.commit(7);
        let again = registry
            .reveal(7, &commitment_map(&key, commitment), &key)
            .unwrap();
        assert_eq!(reveal.master_public_key, again.master_public_key);
        assert_eq!(reveal.bls_public_key, again.bls_public_key);
    }

    #[test]
    fn test_bls_sign_verifies_against_revealed_key() {
        let registry = RoundRegistry::new();
        let key = SigningKey::generate(&mut OsRng);
        let commitment = registry.commit(9);
        let reveal = registry
            .reveal(9, &commitment_map(&key, commitment), &key)
            .unwrap();

        let signature = registry.bls_sign(9, b"mix batch 9").unwrap();
        assert!(bls::verify(&reveal.bls_public_key, b"mix batch 9", &signature).unwrap());
    }

    #[test]
    fn test_extract_deterministic() {
        let registry = RoundRegistry::new();
        registry.commit(42);
        let alice = Identity::from_username("alice@example.com").unwrap();
        let k1 = registry.extract(42, &alice).unwrap();
        let k2 = registry.extract(42, &alice).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_extract_unknown_round() {
        let registry = RoundRegistry::new();
        let alice = Identity::from_username("alice@example.com").unwrap();
        let err = registry.extract(40, &alice).unwrap_err();
        assert_eq!(err.code, ErrorCode::RoundNotFound);
    }
}
