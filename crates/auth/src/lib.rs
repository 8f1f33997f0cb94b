//! Offline-capable session cache for tracker-sync
//!
//! This crate keeps the last session confirmed by an authoritative endpoint
//! and serves it when that endpoint is offline or failing transiently.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracker_sync_auth::{AuthOptions, GoTrueEndpoint, MemorySessionStore, OfflineAuth};
//!
//! # async fn run() -> Result<(), tracker_sync_auth::AuthError> {
//! let url = "https://your-project.supabase.co";
//! let endpoint = Arc::new(GoTrueEndpoint::new(url, "anon-key", reqwest::Client::new()));
//! let auth = OfflineAuth::new(url, endpoint, Arc::new(MemorySessionStore::new()), AuthOptions::default())?;
//!
//! auth.bootstrap().await;
//! let snapshot = auth.refresh_from_server().await;
//! println!("session source: {}", snapshot.source);
//! # Ok(())
//! # }
//! ```

mod endpoint;
mod error;
mod offline;
mod session;
mod snapshot;
mod store;

pub use endpoint::{GoTrueEndpoint, SessionEndpoint};
pub use error::{classify_message, AuthError, ErrorClass};
pub use offline::{AuthOptions, OfflineAuth, SignOutReport};
pub use session::{AuthClock, FixedClock, Session, SystemClock, User};
pub use snapshot::{AuthSnapshot, SessionSource};
pub use store::{storage_key, FileSessionStore, MemorySessionStore, SessionStore};
