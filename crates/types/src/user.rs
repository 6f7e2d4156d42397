//! Persistent user records and their append-only audit log.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::SIGNING_KEY_LEN;

/// What happened to a user record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum UserEventKind {
    /// The registrar reserved the username.
    Preregistered,
    /// The user completed token verification and bound a login key.
    Registered,
}

/// One entry in a user's audit log.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UserEvent {
    /// Unix timestamp (seconds).
    pub time: i64,
    pub kind: UserEventKind,
    /// Login key in effect when the event was appended. All zeroes for
    /// `Preregistered` entries.
    pub login_key: [u8; SIGNING_KEY_LEN],
}

/// The durable record for one identity.
///
/// A record exists iff the username was preregistered; `verified` flips to
/// true exactly once, when registration succeeds. The first audit entry is
/// always `Preregistered`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UserRecord {
    /// Ed25519 public key the user authenticates with. All zeroes until
    /// registration completes.
    pub login_key: [u8; SIGNING_KEY_LEN],
    pub verified: bool,
    pub events: Vec<UserEvent>,
}

impl UserRecord {
    /// Fresh record for a just-preregistered username.
    pub fn preregistered(now: i64) -> Self {
        Self {
            login_key: [0u8; SIGNING_KEY_LEN],
            verified: false,
            events: vec![UserEvent {
                time: now,
                kind: UserEventKind::Preregistered,
                login_key: [0u8; SIGNING_KEY_LEN],
            }],
        }
    }

    /// Bind a login key and mark the record verified.
    pub fn register(&mut self, login_key: [u8; SIGNING_KEY_LEN], now: i64) {
        self.login_key = login_key;
        self.verified = true;
        self.events.push(UserEvent {
            time: now,
            kind: UserEventKind::Registered,
            login_key,
        });
    }
}
