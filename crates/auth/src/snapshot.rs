use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::Session;

/// Where the current session came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    /// No session has been observed.
    None,
    /// Confirmed by the authoritative session endpoint.
    Server,
    /// Served from the local cache.
    Cache,
}

impl std::fmt::Display for SessionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionSource::None => "none",
            SessionSource::Server => "server",
            SessionSource::Cache => "cache",
        };
        write!(f, "{}", s)
    }
}

/// Immutable view of the auth state. Replaced as a whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSnapshot {
    pub data: Option<Session>,
    pub source: SessionSource,
    pub is_expired: bool,
    pub is_offline_fallback: bool,
    pub is_pending: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl AuthSnapshot {
    pub fn none() -> Self {
        Self {
            data: None,
            source: SessionSource::None,
            is_expired: false,
            is_offline_fallback: false,
            is_pending: false,
            last_sync_at: None,
            error: None,
        }
    }

    pub fn none_with_error(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::none()
        }
    }

    pub fn server(session: Session, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: session.is_expired_at(now),
            data: Some(session),
            source: SessionSource::Server,
            is_offline_fallback: false,
            is_pending: false,
            last_sync_at: Some(now),
            error: None,
        }
    }

    pub fn cache(
        session: Session,
        last_sync_at: Option<DateTime<Utc>>,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            is_expired: session.is_expired_at(now),
            data: Some(session),
            source: SessionSource::Cache,
            is_offline_fallback: true,
            is_pending: false,
            last_sync_at,
            error,
        }
    }

    /// Copy with `is_expired` recomputed against `now`.
    pub fn at(&self, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: self
                .data
                .as_ref()
                .is_some_and(|session| session.is_expired_at(now)),
            ..self.clone()
        }
    }

    pub fn with_pending(&self, is_pending: bool) -> Self {
        Self {
            is_pending,
            ..self.clone()
        }
    }

    pub fn has_session(&self) -> bool {
        self.data.is_some()
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::none()
    }
}
