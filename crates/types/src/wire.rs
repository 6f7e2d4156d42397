//! Wire request and reply bodies for the PKG HTTP API.
//!
//! Bodies are JSON with PascalCase field names; byte strings that have a
//! fixed width use exact-size arrays so that a decoded value is already
//! structurally valid.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{BlsPublicKey, ErrorCode, G1Point, MasterPublicKey, Round, SIGNING_KEY_LEN};

/// Maximum body size for `/coordinator/commit` requests.
pub const MAX_COMMIT_BODY: usize = 512;

/// Maximum body size for `/coordinator/reveal` requests.
pub const MAX_REVEAL_BODY: usize = 1024 * 1024;

/// Maximum body size for user and registrar requests.
pub const MAX_USER_BODY: usize = 4096;

/// `POST /user/register`
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterArgs {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Token")]
    pub token: String,
    #[serde(rename = "LoginKey")]
    #[serde_as(as = "[_; 32]")]
    pub login_key: [u8; SIGNING_KEY_LEN],
}

/// `GET /user/status`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusArgs {
    #[serde(rename = "Username")]
    pub username: String,
}

/// `POST /user/extract`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractArgs {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Round")]
    pub round: Round,
}

/// Reply to `/user/extract`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractReply {
    #[serde(rename = "PrivateKey")]
    pub private_key: G1Point,
}

/// `POST /coordinator/commit`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitArgs {
    #[serde(rename = "Round")]
    pub round: Round,
}

/// Reply to `/coordinator/commit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommitReply {
    #[serde(rename = "Commitment")]
    pub commitment: Vec<u8>,
}

/// `POST /coordinator/reveal`
///
/// `commitments` maps hex-encoded signing public keys to the commitments
/// the coordinator collected during the commit phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevealArgs {
    #[serde(rename = "Round")]
    pub round: Round,
    #[serde(rename = "Commitments")]
    pub commitments: HashMap<String, Vec<u8>>,
}

/// Reply to `/coordinator/reveal`: the revealed round keys plus the
/// attestation signature over the full commitment set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevealReply {
    #[serde(rename = "MasterPublicKey")]
    pub master_public_key: MasterPublicKey,
    #[serde(rename = "BLSPublicKey")]
    pub bls_public_key: BlsPublicKey,
    #[serde(rename = "Signature")]
    pub signature: Vec<u8>,
}

/// `POST /registrar/preregister`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreregisterArgs {
    #[serde(rename = "Username")]
    pub username: String,
    /// 1-indexed position of this PKG in the fleet, used in the email text.
    #[serde(rename = "PKGIndex")]
    pub pkg_index: u32,
    #[serde(rename = "NumPKGs")]
    pub num_pkgs: u32,
}

/// `POST /registrar/userfilter`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserFilterArgs {
    #[serde(rename = "Username")]
    pub username: String,
}

/// Reply to `/registrar/userfilter`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserFilterReply {
    #[serde(rename = "Present")]
    pub present: bool,
}

/// Error body returned with any non-2xx status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorReply {
    #[serde(rename = "Code")]
    pub code: ErrorCode,
    #[serde(rename = "Message")]
    pub message: String,
}
