//! Persistent local storage for the anonymous identifier.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{CacheDb, Error};

/// Profile-scoped string storage (the `localStorage` of the host).
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;

    async fn remove_item(&self, key: &str) -> Result<(), Error>;
}

#[async_trait]
impl LocalStore for CacheDb {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        self.get_local_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.set_local_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.remove_local_item(key).await
    }
}

/// In-process store; lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.items.lock().remove(key);
        Ok(())
    }
}
