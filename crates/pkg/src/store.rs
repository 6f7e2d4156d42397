//! The durable user store.
//!
//! A sled database holding one keyspace:
//!
//! * `user/<identity[64]>` → borsh-encoded [`UserRecord`]
//! * `token/<identity[64]>` → pending registration token (hex ASCII)
//!
//! All registration mutations run inside sled transactions so the
//! check-and-set in preregister/register is atomic; the database is flushed
//! before success is reported. This store is the only state that survives
//! a restart; round state is deliberately volatile.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionResult};
use tracing::warn;

use sotto_types::{ErrorCode, Identity, UserEvent, UserRecord};

use crate::error::PkgError;

const USER_PREFIX: &[u8] = b"user/";
const TOKEN_PREFIX: &[u8] = b"token/";

pub struct UserDb {
    db: sled::Db,
}

impl UserDb {
    pub fn open(path: &Path) -> Result<Self, PkgError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    pub fn user_key(identity: &Identity) -> Vec<u8> {
        let mut key = Vec::with_capacity(USER_PREFIX.len() + identity.as_bytes().len());
        key.extend_from_slice(USER_PREFIX);
        key.extend_from_slice(identity.as_ref());
        key
    }

    pub fn token_key(identity: &Identity) -> Vec<u8> {
        let mut key = Vec::with_capacity(TOKEN_PREFIX.len() + identity.as_bytes().len());
        key.extend_from_slice(TOKEN_PREFIX);
        key.extend_from_slice(identity.as_ref());
        key
    }

    /// Run a transaction over the store.
    pub fn transaction<T>(
        &self,
        f: impl Fn(&sled::transaction::TransactionalTree) -> Result<T, ConflictableTransactionError<PkgError>>,
    ) -> Result<T, PkgError> {
        let result: TransactionResult<T, PkgError> = self.db.transaction(f);
        result.map_err(PkgError::from)
    }

    /// Flush to disk. Called after every successful mutation so durability
    /// is established before the caller sees success.
    pub fn flush(&self) -> Result<(), PkgError> {
        self.db.flush()?;
        Ok(())
    }

    /// Fetch a user record. Storage faults are retried once, then surfaced
    /// as `Internal`.
    pub fn get_user(&self, identity: &Identity) -> Result<Option<UserRecord>, PkgError> {
        let key = Self::user_key(identity);
        let raw = match self.db.get(&key) {
            Ok(v) => v,
            Err(first) => {
                warn!(error = %first, "store read failed, retrying once");
                self.db.get(&key)?
            }
        };
        match raw {
            Some(bytes) => {
                let record = borsh::from_slice(&bytes).map_err(PkgError::internal)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// The append-only audit log for a user.
    pub fn user_log(&self, identity: &Identity) -> Result<Vec<UserEvent>, PkgError> {
        match self.get_user(identity)? {
            Some(record) => Ok(record.events),
            None => Err(ErrorCode::NotPreregistered.into()),
        }
    }

    /// Identities of every verified user, in key order.
    pub fn registered_usernames(&self) -> Result<Vec<Identity>, PkgError> {
        let mut identities = Vec::new();
        for entry in self.db.scan_prefix(USER_PREFIX) {
            let (key, value) = entry?;
            let record: UserRecord = borsh::from_slice(&value).map_err(PkgError::internal)?;
            if !record.verified {
                continue;
            }
            let id_bytes: [u8; 64] = key[USER_PREFIX.len()..]
                .try_into()
                .map_err(|_| PkgError::internal("malformed user key"))?;
            identities.push(Identity(id_bytes));
        }
        Ok(identities)
    }
}

/// Shorthand for aborting a transaction with a wire error.
pub fn abort<T>(err: PkgError) -> Result<T, ConflictableTransactionError<PkgError>> {
    Err(ConflictableTransactionError::Abort(err))
}

/// Encode a value inside a transaction, aborting on failure.
pub fn encode_record(
    record: &UserRecord,
) -> Result<Vec<u8>, ConflictableTransactionError<PkgError>> {
    borsh::to_vec(record).map_err(|e| ConflictableTransactionError::Abort(PkgError::internal(e)))
}

/// Decode a record inside a transaction, aborting on failure.
pub fn decode_record(bytes: &[u8]) -> Result<UserRecord, ConflictableTransactionError<PkgError>> {
    borsh::from_slice(bytes).map_err(|e| ConflictableTransactionError::Abort(PkgError::internal(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, UserDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDb::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_user_roundtrip() {
        let (_dir, db) = open_temp();
        let id = Identity::from_username("alice@example.com").unwrap();

        assert!(db.get_user(&id).unwrap().is_none());

        let record = UserRecord::preregistered(10);
        db.transaction(|tx| {
            tx.insert(UserDb::user_key(&id), encode_record(&record)?)?;
            Ok(())
        })
        .unwrap();
        db.flush().unwrap();

        let loaded = db.get_user(&id).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_user_log_missing_user() {
        let (_dir, db) = open_temp();
        let id = Identity::from_valid_username("nonexistent");
        let err = db.user_log(&id).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotPreregistered);
    }

    #[test]
    fn test_registered_usernames_filters_unverified() {
        let (_dir, db) = open_temp();
        let alice = Identity::from_username("alice@example.com").unwrap();
        let bob = Identity::from_username("bob@example.com").unwrap();

        let mut verified = UserRecord::preregistered(1);
        verified.register([5u8; 32], 2);
        let unverified = UserRecord::preregistered(1);

        db.transaction(|tx| {
            tx.insert(UserDb::user_key(&alice), encode_record(&verified)?)?;
            tx.insert(UserDb::user_key(&bob), encode_record(&unverified)?)?;
            Ok(())
        })
        .unwrap();

        let registered = db.registered_usernames().unwrap();
        assert_eq!(registered, vec![alice]);
    }

    #[test]
    fn test_transaction_abort_surfaces_code() {
        let (_dir, db) = open_temp();
        let err = db
            .transaction(|_tx| abort::<()>(PkgError::new(ErrorCode::AlreadyRegistered, "taken")))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyRegistered);
    }
}
