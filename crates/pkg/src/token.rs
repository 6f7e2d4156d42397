//! Registration-token verification strategies.

use sled::transaction::TransactionalTree;
use subtle::ConstantTimeEq;

use sotto_types::{ErrorCode, Identity};

use crate::error::PkgError;
use crate::store::UserDb;

/// A user-supplied verification function, handed the open transaction so
/// any state it touches commits atomically with the registration itself.
pub type CustomTokenVerifier =
    fn(username: &str, token: &str, tx: &TransactionalTree) -> Result<(), PkgError>;

/// How registration tokens are checked.
pub enum RegTokenHandler {
    /// Compare against the token minted at preregistration and delivered by
    /// email; the pending token is consumed on success.
    EmailVerified,
    /// Accept anything. Test fixtures only.
    NoopForTesting,
    /// Delegate to a caller-provided function.
    Custom(CustomTokenVerifier),
}

impl RegTokenHandler {
    /// True when preregistration should persist the minted token.
    pub fn stores_tokens(&self) -> bool {
        matches!(self, RegTokenHandler::EmailVerified)
    }

    /// Verify `token` for `username` inside the registration transaction.
    pub fn verify(
        &self,
        username: &str,
        identity: &Identity,
        token: &str,
        tx: &TransactionalTree,
    ) -> Result<(), PkgError> {
        match self {
            RegTokenHandler::EmailVerified => {
                let key = UserDb::token_key(identity);
                let pending = tx
                    .get(&key)
                    .map_err(PkgError::internal)?
                    .ok_or_else(|| PkgError::new(ErrorCode::InvalidToken, "no pending token"))?;
                if pending.ct_eq(token.as_bytes()).into() {
                    tx.remove(key).map_err(PkgError::internal)?;
                    Ok(())
                } else {
                    Err(PkgError::new(ErrorCode::InvalidToken, "token mismatch"))
                }
            }
            RegTokenHandler::NoopForTesting => Ok(()),
            RegTokenHandler::Custom(f) => f(username, token, tx),
        }
    }
}
