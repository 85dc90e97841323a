//! Session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A server-side login session.
///
/// Holds the digest of the client's token, never the token itself. The
/// digest is skipped when serializing so it cannot leak into responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for the session.
    pub id: String,

    /// Owning user.
    pub user_id: String,

    /// SHA-256 digest of the raw token, hex-encoded.
    #[serde(skip_serializing, default)]
    pub token_hash: String,

    /// Client IP address at creation.
    pub ip_address: String,

    /// Client user agent at creation.
    pub user_agent: String,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session record was last written.
    pub updated_at: DateTime<Utc>,

    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the session is past its expiry right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// A newly issued session together with its raw token.
///
/// This is the only place the raw token ever appears.
#[derive(Clone)]
pub struct CreatedSession {
    pub session: Session,
    pub token: String,
}

impl std::fmt::Debug for CreatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedSession")
            .field("session", &self.session)
            .field("token", &"<redacted>")
            .finish()
    }
}
