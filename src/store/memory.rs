//! In-memory token store
//!
//! HashMap-backed [`ResetTokenStore`] used by the server binary and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::store::{PasswordResetToken, ResetTokenStore};

// == Memory Token Store ==
/// Token store keyed by the secret token value.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    /// Tokens by secret value
    tokens: RwLock<HashMap<String, PasswordResetToken>>,
    /// Set once `disconnect` has run
    disconnected: AtomicBool,
}

impl MemoryTokenStore {
    /// Creates an empty, connected store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.disconnected.load(Ordering::Acquire) {
            Err(StoreError::Disconnected)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResetTokenStore for MemoryTokenStore {
    async fn insert(&self, token: PasswordResetToken) -> Result<()> {
        self.ensure_connected()?;
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.token) {
            return Err(StoreError::Duplicate(token.token));
        }
        tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<PasswordResetToken>> {
        self.ensure_connected()?;
        Ok(self.tokens.read().await.get(token).cloned())
    }

    async fn redeem(&self, token: &str, now: DateTime<Utc>) -> Result<Option<PasswordResetToken>> {
        self.ensure_connected()?;
        let mut tokens = self.tokens.write().await;
        // Removed either way: used tokens are spent, expired ones are garbage
        match tokens.remove(token) {
            Some(record) if !record.is_expired_at(now) => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        self.ensure_connected()?;
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, record| !record.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }

    async fn count(&self) -> Result<u64> {
        self.ensure_connected()?;
        Ok(self.tokens.read().await.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_connected()
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::Release);
        Ok(())
    }
}
