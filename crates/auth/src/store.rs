//! Persistence for the last known good session.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use url::Url;

use crate::error::AuthError;

/// Async key-value persistence for the session cache.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    async fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// Derive the cache key for a server URL and storage prefix.
///
/// `https://abcd.example.co` with prefix `tracker` gives
/// `tracker-abcd-auth-token`.
pub fn storage_key(server_url: &str, prefix: &str) -> Result<String, AuthError> {
    let url = Url::parse(server_url)?;
    let host = url
        .host_str()
        .ok_or(AuthError::UrlParseError(url::ParseError::EmptyHost))?;
    let label = host.split('.').next().unwrap_or(host);
    Ok(format!("{}-{}-auth-token", prefix, label))
}

/// Volatile store, mostly for tests
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AuthError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_uses_first_host_label() {
        let key = storage_key("https://abcd.supabase.co", "tracker").unwrap();
        assert_eq!(key, "tracker-abcd-auth-token");

        let key = storage_key("http://localhost:54321", "dev").unwrap();
        assert_eq!(key, "dev-localhost-auth-token");
    }

    #[test]
    fn storage_key_rejects_garbage() {
        assert!(storage_key("not a url", "tracker").is_err());
    }

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemorySessionStore::new();
        tokio_test::block_on(async {
            assert_eq!(store.get("k").await.unwrap(), None);
            store.set("k", "v").await.unwrap();
            assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
            store.remove("k").await.unwrap();
            store.remove("k").await.unwrap();
            assert_eq!(store.get("k").await.unwrap(), None);
        });
    }
}
