//! User-side client for the sotto PKG.
//!
//! A client authenticates with its login key: every request travels over
//! the mutually-authenticated transport under a self-signed certificate
//! bound to that key. The high-level calls mirror the server paths:
//! `register`, `check_status`, and `extract`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::SigningKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use sotto_crypto::cert::generate_self_signed;
use sotto_crypto::ibe;
use sotto_types::wire::{ErrorReply, ExtractArgs, ExtractReply, RegisterArgs, StatusArgs};
use sotto_types::{
    ErrorCode, G1Point, Identity, MasterPublicKey, PublicServerConfig, Round, CLIENT_CERT_HEADER,
};

/// Errors surfaced by PKG client calls.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PKG {address} replied {code}: {message}")]
    Pkg {
        address: String,
        code: ErrorCode,
        message: String,
    },

    #[error("username is not valid: {0}")]
    InvalidUsername(String),

    #[error("extracted key failed verification against the master public key")]
    KeyVerificationFailed,

    #[error("client certificate setup failed: {0}")]
    Certificate(String),
}

impl ClientError {
    /// The wire error code, when the failure came from a PKG reply.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Pkg { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A user's view of the PKG fleet.
pub struct Client {
    pub username: String,
    login_key: [u8; 32],
    http: reqwest::Client,
    cert_b64: String,
}

impl Client {
    /// Build a client for `username` authenticating with `signing_key`.
    pub fn new(username: &str, signing_key: &SigningKey) -> Result<Self, ClientError> {
        sotto_types::validate_username(username)
            .map_err(|_| ClientError::InvalidUsername(username.to_string()))?;
        let der = generate_self_signed(signing_key)
            .map_err(|e| ClientError::Certificate(e.to_string()))?;
        Ok(Self {
            username: username.to_string(),
            login_key: signing_key.verifying_key().to_bytes(),
            http: reqwest::Client::new(),
            cert_b64: BASE64.encode(der),
        })
    }

    async fn call<A: Serialize, R: DeserializeOwned>(
        &self,
        pkg: &PublicServerConfig,
        method: reqwest::Method,
        path: &str,
        args: &A,
    ) -> Result<R, ClientError> {
        let url = format!("{}/{}", pkg.address.trim_end_matches('/'), path);
        let response = self
            .http
            .request(method, url)
            .header(CLIENT_CERT_HEADER, &self.cert_b64)
            .json(args)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        let reply: ErrorReply = response.json().await?;
        Err(ClientError::Pkg {
            address: pkg.address.clone(),
            code: reply.code,
            message: reply.message,
        })
    }

    /// Complete registration at one PKG with an emailed token.
    pub async fn register(
        &self,
        pkg: &PublicServerConfig,
        token: &str,
    ) -> Result<(), ClientError> {
        let args = RegisterArgs {
            username: self.username.clone(),
            token: token.to_string(),
            login_key: self.login_key,
        };
        self.call::<_, String>(pkg, reqwest::Method::POST, "user/register", &args)
            .await
            .map(|_| ())
    }

    /// Confirm the PKG holds this client's login key for its username.
    pub async fn check_status(&self, pkg: &PublicServerConfig) -> Result<(), ClientError> {
        let args = StatusArgs {
            username: self.username.clone(),
        };
        self.call::<_, String>(pkg, reqwest::Method::GET, "user/status", &args)
            .await
            .map(|_| ())
    }

    /// Fetch this identity's IBE private key for a round.
    pub async fn extract(
        &self,
        pkg: &PublicServerConfig,
        round: Round,
    ) -> Result<G1Point, ClientError> {
        let args = ExtractArgs {
            username: self.username.clone(),
            round,
        };
        let reply: ExtractReply = self
            .call(pkg, reqwest::Method::POST, "user/extract", &args)
            .await?;
        Ok(reply.private_key)
    }

    /// Like [`extract`](Self::extract), but check the returned key against
    /// the round's master public key before trusting it.
    pub async fn extract_verified(
        &self,
        pkg: &PublicServerConfig,
        round: Round,
        master_public_key: &MasterPublicKey,
    ) -> Result<G1Point, ClientError> {
        let key = self.extract(pkg, round).await?;
        let identity = Identity::from_valid_username(&self.username);
        match ibe::verify_identity_key(master_public_key, &identity, &key) {
            Ok(true) => Ok(key),
            _ => Err(ClientError::KeyVerificationFailed),
        }
    }
}
