//! Store Module
//!
//! Persistent storage for password reset tokens.
//!
//! The relational database sits behind [`ResetTokenStore`]; the server and the
//! cleanup task only ever talk to the trait.

mod memory;
mod token;


use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

// Re-export public types
pub use memory::MemoryTokenStore;
pub use token::PasswordResetToken;

// == Reset Token Store ==
/// Storage contract for password reset tokens.
///
/// `delete_expired` must be a single atomic "delete where expires_at < now";
/// concurrent callers rely on that instead of any application-level lock.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Persists a newly issued token.
    async fn insert(&self, token: PasswordResetToken) -> Result<()>;

    /// Looks up a token by its secret value, expired or not.
    async fn find(&self, token: &str) -> Result<Option<PasswordResetToken>>;

    /// Consumes a token: returns and deletes it if still valid at `now`.
    ///
    /// An expired token is deleted and reported as absent.
    async fn redeem(&self, token: &str, now: DateTime<Utc>) -> Result<Option<PasswordResetToken>>;

    /// Deletes every token whose expiry is strictly before `now`.
    ///
    /// Returns the number of deleted records.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Number of stored tokens.
    async fn count(&self) -> Result<u64>;

    /// Cheap connectivity probe used by the health endpoint.
    async fn ping(&self) -> Result<()>;

    /// Releases the connection at shutdown.
    async fn disconnect(&self) -> Result<()>;
}
