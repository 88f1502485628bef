//! In-process credential store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;
use crate::auth::CredentialPair;

use super::CredentialStore;

/// A credential store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pair: RwLock<Option<CredentialPair>>,
    revision: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out holding `pair`.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
            revision: AtomicU64::new(0),
        }
    }

    /// Number of `set`/`clear` calls made so far.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self) -> Result<Option<CredentialPair>> {
        Ok(self.pair.read().await.clone())
    }

    async fn set(&self, pair: CredentialPair) -> Result<()> {
        *self.pair.write().await = Some(pair);
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.pair.write().await = None;
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
