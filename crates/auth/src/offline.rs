//! Offline-capable session cache.
//!
//! Prefers the authoritative endpoint and falls back to the last session it
//! confirmed when the endpoint is unreachable. The snapshot is replaced as a
//! whole on every transition and published on a `watch` channel.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::endpoint::SessionEndpoint;
use crate::error::{AuthError, ErrorClass};
use crate::session::{AuthClock, Session, SystemClock};
use crate::snapshot::AuthSnapshot;
use crate::store::{storage_key, SessionStore};

/// Offline auth options
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Prefix of the cache key
    pub storage_prefix: String,
    /// Write confirmed sessions through to the store
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            storage_prefix: "tracker".to_string(),
            persist_session: true,
        }
    }
}

impl AuthOptions {
    pub fn with_storage_prefix(mut self, value: &str) -> Self {
        self.storage_prefix = value.to_string();
        self
    }

    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }
}

/// What the store holds under the session key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedSession {
    session: Session,
    synced_at: DateTime<Utc>,
}

/// Result of [`OfflineAuth::sign_out`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutReport {
    /// Whether the server accepted the sign-out. Local state is cleared either way.
    pub remote_signed_out: bool,
    pub error: Option<String>,
}

pub struct OfflineAuth {
    endpoint: Arc<dyn SessionEndpoint>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn AuthClock>,
    options: AuthOptions,
    storage_key: String,
    snapshot: watch::Sender<Arc<AuthSnapshot>>,
    next_request: AtomicU64,
    in_flight: AtomicUsize,
    /// Id of the last refresh whose result was applied
    applied: Mutex<u64>,
}

impl OfflineAuth {
    pub fn new(
        server_url: &str,
        endpoint: Arc<dyn SessionEndpoint>,
        store: Arc<dyn SessionStore>,
        options: AuthOptions,
    ) -> Result<Self, AuthError> {
        let storage_key = storage_key(server_url, &options.storage_prefix)?;
        let (snapshot, _) = watch::channel(Arc::new(AuthSnapshot::none()));
        Ok(Self {
            endpoint,
            store,
            clock: Arc::new(SystemClock),
            options,
            storage_key,
            snapshot,
            next_request: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            applied: Mutex::new(0),
        })
    }

    /// Replace the clock used for expiry checks and sync times.
    pub fn with_clock(mut self, clock: Arc<dyn AuthClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Current state, with `is_expired` recomputed against the clock.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot.borrow().at(self.clock.now())
    }

    /// Receive every snapshot replacement.
    ///
    /// A received snapshot carries `is_expired` as of its publication and is
    /// not updated as time passes. Read it through [`AuthSnapshot::at`] with
    /// the current time, or call [`OfflineAuth::snapshot`].
    pub fn subscribe(&self) -> watch::Receiver<Arc<AuthSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Load the cached session, if any, as an offline fallback.
    pub async fn bootstrap(&self) -> AuthSnapshot {
        match self.read_cache().await {
            Some(cached) => {
                info!("Bootstrapped session from cache");
                let now = self.clock.now();
                self.publish(AuthSnapshot::cache(
                    cached.session,
                    Some(cached.synced_at),
                    None,
                    now,
                ));
            }
            None => debug!("No cached session"),
        }
        self.snapshot()
    }

    /// Ask the authoritative endpoint and transition on its answer.
    ///
    /// A response is discarded if a later call has already applied its own.
    pub async fn refresh_from_server(&self) -> AuthSnapshot {
        let request = self.next_request.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let current = self.snapshot.borrow().clone();
        self.publish(current.with_pending(true));

        let result = self.endpoint.get_session(current.data.as_ref()).await;

        let mut applied = self.applied.lock().await;
        let still_pending = self.in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        if request < *applied {
            debug!(
                "Discarding stale session response {} (applied {})",
                request, *applied
            );
            if !still_pending {
                let latest = self.snapshot.borrow().clone();
                self.publish(latest.with_pending(false));
            }
            return self.snapshot();
        }
        *applied = request;

        let next = match result {
            Ok(Some(payload)) => self.accept_payload(payload).await,
            Ok(None) => {
                info!("Server holds no session");
                self.clear_cache().await;
                AuthSnapshot::none()
            }
            Err(err) => self.recover(err, current.data.clone()).await,
        };
        self.publish(next.with_pending(still_pending));
        drop(applied);

        self.snapshot()
    }

    /// Return the held session when `prefer_cache` allows it, otherwise refresh.
    pub async fn get_session(&self, prefer_cache: bool) -> AuthSnapshot {
        if prefer_cache && self.snapshot.borrow().has_session() {
            return self.snapshot();
        }
        self.refresh_from_server().await
    }

    /// Clear local state, then try to revoke the session remotely.
    pub async fn sign_out(&self) -> SignOutReport {
        let session = self.snapshot.borrow().data.clone();
        self.clear_cache().await;
        self.publish(AuthSnapshot::none());

        match self.endpoint.sign_out(session.as_ref()).await {
            Ok(()) => SignOutReport {
                remote_signed_out: true,
                error: None,
            },
            Err(err) => {
                warn!("Remote sign-out failed: {}", err);
                SignOutReport {
                    remote_signed_out: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn accept_payload(&self, payload: serde_json::Value) -> AuthSnapshot {
        let now = self.clock.now();
        match serde_json::from_value::<Session>(payload) {
            Ok(session) => {
                let session = session.with_expiry_from(now);
                self.write_cache(&session, now).await;
                AuthSnapshot::server(session, now)
            }
            Err(err) => {
                warn!("Session payload rejected: {}", err);
                self.clear_cache().await;
                AuthSnapshot::none_with_error(format!("Invalid session payload: {}", err))
            }
        }
    }

    async fn recover(&self, err: AuthError, held: Option<Session>) -> AuthSnapshot {
        let message = err.to_string();
        match err.class() {
            ErrorClass::Recoverable => {
                let fallback = match self.read_cache().await {
                    Some(cached) => Some((cached.session, Some(cached.synced_at))),
                    None => held.map(|session| {
                        let last_sync = self.snapshot.borrow().last_sync_at;
                        (session, last_sync)
                    }),
                };
                match fallback {
                    Some((session, last_sync_at)) => {
                        warn!("Session endpoint unavailable, serving cache: {}", message);
                        AuthSnapshot::cache(session, last_sync_at, Some(message), self.clock.now())
                    }
                    None => {
                        self.clear_cache().await;
                        AuthSnapshot::none_with_error(message)
                    }
                }
            }
            class => {
                info!("Clearing session after {:?}: {}", class, message);
                self.clear_cache().await;
                AuthSnapshot::none_with_error(message)
            }
        }
    }

    fn publish(&self, snapshot: AuthSnapshot) {
        self.snapshot.send_replace(Arc::new(snapshot));
    }

    async fn read_cache(&self) -> Option<CachedSession> {
        let raw = match self.store.get(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("Failed to read session cache: {}", err);
                return None;
            }
        };
        match serde_json::from_str::<CachedSession>(&raw) {
            Ok(cached) => Some(cached),
            Err(err) => {
                warn!("Discarding unreadable session cache: {}", err);
                self.clear_cache().await;
                None
            }
        }
    }

    async fn write_cache(&self, session: &Session, now: DateTime<Utc>) {
        if !self.options.persist_session {
            return;
        }
        let cached = CachedSession {
            session: session.clone(),
            synced_at: now,
        };
        let result = match serde_json::to_string(&cached) {
            Ok(raw) => self.store.set(&self.storage_key, &raw).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            warn!("Failed to write session cache: {}", err);
        }
    }

    async fn clear_cache(&self) {
        if let Err(err) = self.store.remove(&self.storage_key).await {
            warn!("Failed to clear session cache: {}", err);
        }
    }
}
