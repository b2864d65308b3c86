//! Password Reset Token Module
//!
//! Defines the persisted record issued by the password-reset flow.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// == Password Reset Token ==
/// A single-use password reset token with a hard expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetToken {
    /// Record identifier
    pub id: Uuid,
    /// Secret value mailed to the user
    pub token: String,
    /// Owner of the token
    pub user_id: String,
    /// Instant after which the token is unusable
    pub expires_at: DateTime<Utc>,
    /// Issue timestamp
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    // == Constructor ==
    /// Issues a fresh token for `user_id` that stays valid for `ttl`.
    pub fn issue(user_id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self::with_expiry(user_id, now + ttl)
    }

    /// Creates a token with an explicit expiry timestamp.
    pub fn with_expiry(user_id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: Uuid::new_v4().simple().to_string(),
            user_id: user_id.into(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    // == Is Expired ==
    /// Checks whether the token is past its expiry at `now`.
    ///
    /// A token expiring exactly at `now` is still valid; only strictly earlier
    /// expiries count, matching the bulk delete predicate.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
