//! The sotto Private Key Generator (PKG) server.
//!
//! A PKG issues per-round IBE private keys to users whose email-style
//! username has been verified, and participates in the coordinator-driven
//! commit/reveal protocol that assembles a messaging round's master keys.
//!
//! The server is three coupled subsystems:
//!
//! * the **round registry** ([`registry`]): volatile per-round key state,
//!   commit/reveal with cross-PKG attestation, bounded retention;
//! * the **registration pipeline** ([`store`], [`token`], [`mail`]): a
//!   durable user store with an email-token verification flow;
//! * the **extraction service**: per-identity IBE keys derived from a
//!   round's master secret.
//!
//! Requests arrive over a mutually-authenticated transport; the [`auth`]
//! adapter turns the peer certificate into an Ed25519 key that each
//! handler checks against the key it requires.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tracing::info;

use sotto_types::wire::{
    ExtractArgs, ExtractReply, PreregisterArgs, RegisterArgs, StatusArgs, UserFilterArgs,
    UserFilterReply,
};
use sotto_types::{ErrorCode, Identity, RegToken, UserEvent, UserRecord, SIGNING_KEY_LEN};

pub mod auth;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod registry;
pub mod store;
pub mod token;

pub use error::PkgError;
pub use mail::{Mailer, SmtpRelay};
pub use registry::RoundRegistry;
pub use store::UserDb;
pub use token::RegTokenHandler;

/// Configuration for a PKG server.
pub struct Config {
    /// Path to the sled database directory.
    pub db_path: PathBuf,
    /// The PKG's long-term signing key.
    pub signing_key: SigningKey,
    /// The key authorized to drive commit/reveal rounds.
    pub coordinator_key: [u8; SIGNING_KEY_LEN],
    /// The key authorized to preregister users.
    pub registrar_key: [u8; SIGNING_KEY_LEN],
    /// Delivery channel for verification emails.
    pub mailer: Arc<dyn Mailer>,
    /// Registration-token verification strategy.
    pub token_handler: RegTokenHandler,
}

/// A Private Key Generator server.
pub struct Server {
    db: UserDb,
    pub(crate) rounds: RoundRegistry,
    pub(crate) signing_key: SigningKey,
    public_key: [u8; SIGNING_KEY_LEN],
    pub(crate) coordinator_key: [u8; SIGNING_KEY_LEN],
    pub(crate) registrar_key: [u8; SIGNING_KEY_LEN],
    mailer: Arc<dyn Mailer>,
    token_handler: RegTokenHandler,
}

impl Server {
    pub fn new(config: Config) -> Result<Self, PkgError> {
        let db = UserDb::open(&config.db_path)?;
        let public_key = config.signing_key.verifying_key().to_bytes();
        Ok(Self {
            db,
            rounds: RoundRegistry::new(),
            signing_key: config.signing_key,
            public_key,
            coordinator_key: config.coordinator_key,
            registrar_key: config.registrar_key,
            mailer: config.mailer,
            token_handler: config.token_handler,
        })
    }

    /// The PKG's long-term signing public key.
    pub fn public_key(&self) -> [u8; SIGNING_KEY_LEN] {
        self.public_key
    }

    /// The HTTP surface of this PKG. Unknown paths fall through to 404.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/user/register", post(handlers::register))
            .route("/user/status", get(handlers::status))
            .route("/user/extract", post(handlers::extract))
            .route("/coordinator/commit", post(handlers::commit))
            .route("/coordinator/reveal", post(handlers::reveal))
            .route("/registrar/preregister", post(handlers::preregister))
            .route("/registrar/userfilter", post(handlers::userfilter))
            .layer(middleware::from_fn(auth::peer_cert_middleware))
            .with_state(self)
    }

    /// Reserve a username and dispatch its verification email.
    pub async fn preregister(&self, args: &PreregisterArgs) -> Result<(), PkgError> {
        let identity = Identity::from_username(&args.username)
            .map_err(|code| PkgError::new(code, format!("invalid username: {}", args.username)))?;

        let token = RegToken::mint(&mut OsRng);
        let token_hex = token.to_hex();
        let now = unix_now();
        let store_token = self.token_handler.stores_tokens();

        self.db.transaction(|tx| {
            let key = UserDb::user_key(&identity);
            if tx.get(&key)?.is_some() {
                return store::abort(PkgError::new(
                    ErrorCode::AlreadyRegistered,
                    format!("username already preregistered: {}", args.username),
                ));
            }
            let record = UserRecord::preregistered(now);
            tx.insert(key, store::encode_record(&record)?)?;
            if store_token {
                tx.insert(UserDb::token_key(&identity), token_hex.as_bytes())?;
            }
            Ok(())
        })?;
        self.db.flush()?;

        self.mailer
            .send_verification(&args.username, &token, args.pkg_index, args.num_pkgs)
            .await
            .map_err(PkgError::internal)?;

        info!(username = %args.username, "preregistered user");
        Ok(())
    }

    /// Complete a registration: verify the token and bind the login key.
    pub fn register(
        &self,
        peer_key: [u8; SIGNING_KEY_LEN],
        args: &RegisterArgs,
    ) -> Result<(), PkgError> {
        if peer_key != args.login_key {
            return Err(PkgError::unauthorized(
                "peer certificate does not match the claimed login key",
            ));
        }
        let identity = Identity::from_username(&args.username)
            .map_err(|code| PkgError::new(code, format!("invalid username: {}", args.username)))?;
        let now = unix_now();

        self.db.transaction(|tx| {
            let key = UserDb::user_key(&identity);
            let bytes = match tx.get(&key)? {
                Some(bytes) => bytes,
                None => {
                    return store::abort(PkgError::new(
                        ErrorCode::NotPreregistered,
                        format!("username not preregistered: {}", args.username),
                    ))
                }
            };
            let mut record = store::decode_record(&bytes)?;

            if record.verified {
                // Re-registering with the same key is a no-op.
                if record.login_key == args.login_key {
                    return Ok(());
                }
                return store::abort(PkgError::new(
                    ErrorCode::AlreadyRegistered,
                    "registered with a different login key",
                ));
            }

            self.token_handler
                .verify(&args.username, &identity, &args.token, tx)
                .map_err(sled::transaction::ConflictableTransactionError::Abort)?;

            record.register(args.login_key, now);
            tx.insert(key, store::encode_record(&record)?)?;
            Ok(())
        })?;
        self.db.flush()?;

        info!(username = %args.username, "registered user");
        Ok(())
    }

    /// Check that the peer owns the registered login key for a username.
    pub fn status(
        &self,
        peer_key: [u8; SIGNING_KEY_LEN],
        args: &StatusArgs,
    ) -> Result<(), PkgError> {
        let identity = Identity::from_username(&args.username)
            .map_err(|code| PkgError::new(code, format!("invalid username: {}", args.username)))?;
        let record = self
            .db
            .get_user(&identity)?
            .ok_or_else(|| PkgError::new(ErrorCode::NotPreregistered, "unknown user"))?;
        if !record.verified || record.login_key != peer_key {
            return Err(PkgError::unauthorized("login key mismatch"));
        }
        Ok(())
    }

    /// Extract the IBE private key for the peer's identity at a round.
    pub fn extract(
        &self,
        peer_key: [u8; SIGNING_KEY_LEN],
        args: &ExtractArgs,
    ) -> Result<ExtractReply, PkgError> {
        let identity = Identity::from_username(&args.username)
            .map_err(|code| PkgError::new(code, format!("invalid username: {}", args.username)))?;
        let record = self
            .db
            .get_user(&identity)?
            .ok_or_else(|| PkgError::new(ErrorCode::NotPreregistered, "unknown user"))?;
        if !record.verified || record.login_key != peer_key {
            return Err(PkgError::unauthorized("login key mismatch"));
        }

        let private_key = self.rounds.extract(args.round, &identity)?;
        Ok(ExtractReply { private_key })
    }

    /// Registrar helper: is a username present (preregistered or registered)?
    pub fn user_filter(&self, args: &UserFilterArgs) -> Result<UserFilterReply, PkgError> {
        let identity = Identity::from_username(&args.username)
            .map_err(|code| PkgError::new(code, format!("invalid username: {}", args.username)))?;
        Ok(UserFilterReply {
            present: self.db.get_user(&identity)?.is_some(),
        })
    }

    /// The audit log for an identity. `NotPreregistered` if unknown.
    pub fn user_log(&self, identity: &Identity) -> Result<Vec<UserEvent>, PkgError> {
        self.db.user_log(identity)
    }

    /// Identities of all verified users.
    pub fn registered_usernames(&self) -> Result<Vec<Identity>, PkgError> {
        self.db.registered_usernames()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
