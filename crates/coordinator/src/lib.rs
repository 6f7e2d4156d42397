//! Coordinator client for PKG rounds.
//!
//! The coordinator drives the two-phase protocol that assembles a round's
//! master keys across a fleet of PKGs:
//!
//! 1. **Commit**: ask every PKG for its round commitment. Any failure
//!    aborts the round.
//! 2. **Reveal**: hand every PKG the complete commitment map and collect
//!    the revealed keys plus attestation signatures.
//! 3. **Verify**: rebuild the attestation message from the revealed keys
//!    and check every PKG's signature. Only a fully verified set becomes
//!    the round settings.
//!
//! It also fans preregistration out across the fleet, one result per PKG,
//! so a faulty PKG does not block the others.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::SigningKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use sotto_crypto::attestation::{attestation_message, verify_attestation};
use sotto_crypto::cert::generate_self_signed;
use sotto_crypto::commit_to;
use sotto_types::wire::{CommitArgs, CommitReply, ErrorReply, PreregisterArgs, RevealArgs, RevealReply};
use sotto_types::{ErrorCode, PublicServerConfig, Round, CLIENT_CERT_HEADER, COMMITMENT_LEN};

/// Errors surfaced while coordinating a round.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PKG {address} replied {code}: {message}")]
    Pkg {
        address: String,
        code: ErrorCode,
        message: String,
    },

    #[error("PKG {address} returned a malformed commitment")]
    MalformedCommitment { address: String },

    #[error("could not verify round settings")]
    VerificationFailed,

    #[error("client certificate setup failed: {0}")]
    Certificate(String),
}

/// The verified outcome of a round: hex(signing key) → reveal reply.
#[derive(Clone, Debug, Default)]
pub struct RoundSettings(pub HashMap<String, RevealReply>);

impl RoundSettings {
    /// The reveal reply from the PKG with this signing key.
    pub fn get(&self, key: &[u8; 32]) -> Option<&RevealReply> {
        self.0.get(&hex::encode(key))
    }

    /// Cross-PKG verification: every listed PKG must have signed the
    /// attestation over the commitment set recomputed from its revealed
    /// keys. Removing, reordering, substituting, or modifying any element
    /// makes this fail.
    pub fn verify(&self, round: Round, keys: &[[u8; 32]]) -> bool {
        if keys.len() != self.0.len() {
            return false;
        }

        let mut entries = BTreeMap::new();
        for key in keys {
            let hexkey = hex::encode(key);
            let Some(reveal) = self.0.get(&hexkey) else {
                return false;
            };
            let commitment = commit_to(&reveal.master_public_key, &reveal.bls_public_key);
            entries.insert(hexkey, commitment.to_vec());
        }
        let message = attestation_message(round, &entries);

        keys.iter().all(|key| {
            let Some(reveal) = self.0.get(&hex::encode(key)) else {
                return false;
            };
            verify_attestation(key, &message, &reveal.signature).unwrap_or(false)
        })
    }
}

/// A client holding the coordinator's signing identity.
pub struct CoordinatorClient {
    http: reqwest::Client,
    cert_b64: String,
}

impl CoordinatorClient {
    /// Build the client; the transport and client certificate are
    /// constructed eagerly.
    pub fn new(key: &SigningKey) -> Result<Self, CoordinatorError> {
        let der = generate_self_signed(key)
            .map_err(|e| CoordinatorError::Certificate(e.to_string()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            cert_b64: BASE64.encode(der),
        })
    }

    async fn post<A: Serialize, R: DeserializeOwned>(
        &self,
        pkg: &PublicServerConfig,
        path: &str,
        args: &A,
    ) -> Result<R, CoordinatorError> {
        let url = format!("{}/{}", pkg.address.trim_end_matches('/'), path);
        let response = self
            .http
            .post(url)
            .header(CLIENT_CERT_HEADER, &self.cert_b64)
            .json(args)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        let reply: ErrorReply = response.json().await?;
        Err(CoordinatorError::Pkg {
            address: pkg.address.clone(),
            code: reply.code,
            message: reply.message,
        })
    }

    /// Run commit/reveal/verify for `round` across `pkgs`.
    pub async fn new_round(
        &self,
        pkgs: &[PublicServerConfig],
        round: Round,
    ) -> Result<RoundSettings, CoordinatorError> {
        // Commit phase: collect every PKG's commitment before revealing
        // anything; the reveal arguments carry the full set.
        let mut commitments = HashMap::new();
        for pkg in pkgs {
            let reply: CommitReply = self
                .post(pkg, "coordinator/commit", &CommitArgs { round })
                .await?;
            if reply.commitment.len() != COMMITMENT_LEN {
                return Err(CoordinatorError::MalformedCommitment {
                    address: pkg.address.clone(),
                });
            }
            commitments.insert(hex::encode(pkg.key), reply.commitment);
        }
        info!(round, pkgs = pkgs.len(), "collected commitments");

        // Reveal phase.
        let reveal_args = RevealArgs {
            round,
            commitments,
        };
        let mut settings = RoundSettings::default();
        for pkg in pkgs {
            let reply: RevealReply = self.post(pkg, "coordinator/reveal", &reveal_args).await?;
            settings.0.insert(hex::encode(pkg.key), reply);
        }

        let keys: Vec<[u8; 32]> = pkgs.iter().map(|pkg| pkg.key).collect();
        if !settings.verify(round, &keys) {
            return Err(CoordinatorError::VerificationFailed);
        }
        info!(round, "round settings verified");

        Ok(settings)
    }

    /// Preregister `username` on every PKG concurrently; one result each.
    pub async fn preregister_user(
        &self,
        username: &str,
        pkgs: &[PublicServerConfig],
    ) -> Vec<Result<(), CoordinatorError>> {
        let calls = pkgs.iter().enumerate().map(|(i, pkg)| {
            let args = PreregisterArgs {
                username: username.to_string(),
                // 1-indexed so users see "server 1 of N" in the email.
                pkg_index: i as u32 + 1,
                num_pkgs: pkgs.len() as u32,
            };
            async move {
                self.post::<_, String>(pkg, "registrar/preregister", &args)
                    .await
                    .map(|_| ())
            }
        });
        futures::future::join_all(calls).await
    }
}
