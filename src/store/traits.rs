//! Store traits — the two keyed-document surfaces the bot persists through.
//!
//! Sessions and identities live in separate stores. Neither offers
//! transactions: every write is an independent upsert and the last write wins.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::DatabaseError;

use super::session::{Session, SessionPatch};

/// A credentialed relay identity: a mailbox address and its app secret.
#[derive(Debug, Clone)]
pub struct Identity {
    pub address: String,
    pub secret: SecretString,
}

impl Identity {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: SecretString::from(secret.into()),
        }
    }
}

/// Per-actor session documents with merge-on-write semantics.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the full session for an actor. Unknown actors get an empty session.
    async fn get_session(&self, user_id: &str) -> Result<Session, DatabaseError>;

    /// Merge `patch` into the actor's session, creating it if needed.
    ///
    /// Fields in the patch overwrite stored fields of the same name; fields
    /// set to JSON `null` are removed; every other stored field is untouched.
    async fn upsert_session(&self, user_id: &str, patch: &SessionPatch)
    -> Result<(), DatabaseError>;
}

/// Relay identities keyed by address.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Add an identity, or rotate the secret of an existing one.
    async fn upsert_identity(
        &self,
        address: &str,
        secret: &SecretString,
    ) -> Result<(), DatabaseError>;

    /// All identities, oldest first.
    async fn list_identities(&self) -> Result<Vec<Identity>, DatabaseError>;

    /// Delete an identity. Returns whether it existed.
    async fn remove_identity(&self, address: &str) -> Result<bool, DatabaseError>;

    /// Number of configured identities.
    async fn count_identities(&self) -> Result<usize, DatabaseError>;
}
