//! Credential persistence.
//!
//! The store holds at most one [`CredentialPair`]. Writes replace the whole
//! pair and `clear` removes the whole pair, so a reader never observes a
//! half-written session. Only the
//! [`RefreshCoordinator`](crate::RefreshCoordinator) writes to it; everything
//! else reads.

mod file;
mod memory;

use async_trait::async_trait;

use crate::Result;
use crate::auth::CredentialPair;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key/value storage for the current credential pair.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the current pair, if a session is stored.
    async fn get(&self) -> Result<Option<CredentialPair>>;

    /// Replaces the stored pair.
    async fn set(&self, pair: CredentialPair) -> Result<()>;

    /// Removes the stored pair.
    async fn clear(&self) -> Result<()>;
}
