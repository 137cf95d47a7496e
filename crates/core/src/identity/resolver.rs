//! Visitor identity resolution.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::anon::generate_anonymous_id;
use super::session::{Session, SessionProvider};
use super::store::LocalStore;
use super::Identity;
use crate::Error;

/// Answers "who is the current visitor".
///
/// An authenticated session always wins; otherwise the persisted anonymous
/// identifier is used, generated on first need. Signing in does not merge
/// the anonymous identifier into the account: the two stay distinct.
#[derive(Clone)]
pub struct IdentityResolver {
    sessions: Arc<dyn SessionProvider>,
    store: Option<Arc<dyn LocalStore>>,
    storage_key: String,
    generate_lock: Arc<Mutex<()>>,
}

impl IdentityResolver {
    pub fn new(
        sessions: Arc<dyn SessionProvider>, store: Option<Arc<dyn LocalStore>>, storage_key: impl Into<String>,
    ) -> Self {
        Self { sessions, store, storage_key: storage_key.into(), generate_lock: Arc::new(Mutex::new(())) }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Resolve the identity for the current session.
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` when there is no session and no local
    /// store: an identity that is not persisted would change on every call.
    pub async fn resolve(&self) -> Result<Identity, Error> {
        let session = self.sessions.current_session().await?;
        self.resolve_for(session.as_ref()).await
    }

    /// Resolve the identity for a given session state.
    pub async fn resolve_for(&self, session: Option<&Session>) -> Result<Identity, Error> {
        if let Some(session) = session {
            return Ok(Identity::authenticated(session.user_id.clone()));
        }

        let store = self.store.as_ref().ok_or(Error::StorageUnavailable)?;

        if let Some(id) = self.stored_anonymous_id(store.as_ref()).await? {
            return Ok(Identity::anonymous(id));
        }

        // Re-check under the lock so concurrent first visits agree on one id.
        let _guard = self.generate_lock.lock().await;
        if let Some(id) = self.stored_anonymous_id(store.as_ref()).await? {
            return Ok(Identity::anonymous(id));
        }

        let id = generate_anonymous_id();
        store.set_item(&self.storage_key, &id).await?;
        tracing::info!(user_id = %id, "generated anonymous identity");

        Ok(Identity::anonymous(id))
    }

    /// Forget the stored anonymous identifier.
    pub async fn clear_anonymous(&self) -> Result<(), Error> {
        let store = self.store.as_ref().ok_or(Error::StorageUnavailable)?;
        store.remove_item(&self.storage_key).await?;
        tracing::info!(key = %self.storage_key, "cleared anonymous identity");
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), Error> {
        self.sessions.sign_out().await
    }

    /// Re-resolve on every session change and hand each result to `callback`.
    ///
    /// The current identity is delivered first. Results arrive one at a time,
    /// in the order the provider emitted the underlying events; repeated
    /// identical events produce repeated identical identities.
    pub fn subscribe<F>(&self, callback: F) -> IdentitySubscription
    where
        F: Fn(Result<Identity, Error>) + Send + 'static,
    {
        let mut events = self.sessions.subscribe();
        let resolver = self.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::debug!(kind = ?event.kind, "re-resolving identity");
                let identity = resolver.resolve_for(event.session.as_ref()).await;
                callback(identity);
            }
        });

        IdentitySubscription { task }
    }

    async fn stored_anonymous_id(&self, store: &dyn LocalStore) -> Result<Option<String>, Error> {
        Ok(store
            .get_item(&self.storage_key)
            .await?
            .filter(|id| !id.trim().is_empty()))
    }
}

/// Handle to a live identity subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct IdentitySubscription {
    task: JoinHandle<()>,
}

impl IdentitySubscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::anon::is_anonymous_id;
    use crate::identity::session::SessionHub;
    use crate::identity::store::MemoryStore;
    use crate::CacheDb;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const KEY: &str = "nutz_anonymous_user_id";

    fn resolver_with(hub: &SessionHub, store: Arc<dyn LocalStore>) -> IdentityResolver {
        IdentityResolver::new(Arc::new(hub.clone()), Some(store), KEY)
    }

    #[tokio::test]
    async fn test_fresh_visitor_gets_persisted_anonymous_id() {
        let hub = SessionHub::new();
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver_with(&hub, store.clone());

        let first = resolver.resolve().await.unwrap();
        assert!(first.is_anonymous);
        assert!(is_anonymous_id(&first.user_id));
        assert_eq!(store.get_item(KEY).await.unwrap().as_deref(), Some(first.user_id.as_str()));

        let second = resolver.resolve().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_existing_anonymous_id_is_reused() {
        let hub = SessionHub::new();
        let store = Arc::new(MemoryStore::new());
        store.set_item(KEY, "anon-1700000000000-abc123xyz").await.unwrap();

        let identity = resolver_with(&hub, store).resolve().await.unwrap();
        assert_eq!(identity, Identity::anonymous("anon-1700000000000-abc123xyz"));
    }

    #[tokio::test]
    async fn test_blank_stored_id_is_replaced() {
        let hub = SessionHub::new();
        let store = Arc::new(MemoryStore::new());
        store.set_item(KEY, "  ").await.unwrap();

        let identity = resolver_with(&hub, store).resolve().await.unwrap();
        assert!(is_anonymous_id(&identity.user_id));
    }

    #[tokio::test]
    async fn test_authenticated_session_wins_without_touching_store() {
        let hub = SessionHub::with_session(Session::new("user-42"));
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver_with(&hub, store.clone());

        let identity = resolver.resolve().await.unwrap();
        assert_eq!(identity, Identity::authenticated("user-42"));
        assert_eq!(store.get_item(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_in_switches_on_next_call() {
        let hub = SessionHub::new();
        let resolver = resolver_with(&hub, Arc::new(MemoryStore::new()));

        let anonymous = resolver.resolve().await.unwrap();
        hub.sign_in(Session::new("user-42"));
        let signed_in = resolver.resolve().await.unwrap();

        assert_eq!(signed_in, Identity::authenticated("user-42"));
        assert_ne!(signed_in.user_id, anonymous.user_id);
    }

    #[tokio::test]
    async fn test_sign_out_falls_back_to_same_anonymous_id() {
        let hub = SessionHub::new();
        let resolver = resolver_with(&hub, Arc::new(MemoryStore::new()));

        let anonymous = resolver.resolve().await.unwrap();
        hub.sign_in(Session::new("user-42"));
        resolver.sign_out().await.unwrap();

        assert_eq!(resolver.resolve().await.unwrap(), anonymous);
    }

    #[tokio::test]
    async fn test_clear_anonymous_generates_new_id() {
        let hub = SessionHub::new();
        let resolver = resolver_with(&hub, Arc::new(MemoryStore::new()));

        let before = resolver.resolve().await.unwrap();
        resolver.clear_anonymous().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let after = resolver.resolve().await.unwrap();

        assert!(after.is_anonymous);
        assert_ne!(before.user_id, after.user_id);
    }

    #[tokio::test]
    async fn test_no_store_fails_fast() {
        let hub = SessionHub::new();
        let resolver = IdentityResolver::new(Arc::new(hub.clone()), None, KEY);

        assert!(matches!(resolver.resolve().await, Err(Error::StorageUnavailable)));

        hub.sign_in(Session::new("user-42"));
        assert_eq!(resolver.resolve().await.unwrap(), Identity::authenticated("user-42"));
    }

    #[tokio::test]
    async fn test_concurrent_first_resolves_agree() {
        let hub = SessionHub::new();
        let resolver = resolver_with(&hub, Arc::new(CacheDb::open_in_memory().await.unwrap()));

        let (a, b) = tokio::join!(resolver.resolve(), resolver.resolve());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_subscription_follows_session_changes() {
        let hub = SessionHub::new();
        let resolver = resolver_with(&hub, Arc::new(MemoryStore::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = resolver.subscribe(move |identity| {
            let _ = tx.send(identity.unwrap());
        });

        let initial = rx.recv().await.unwrap();
        assert!(initial.is_anonymous);

        hub.sign_in(Session::new("user-42"));
        assert_eq!(rx.recv().await.unwrap(), Identity::authenticated("user-42"));

        hub.sign_out().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), initial);

        subscription.unsubscribe();
        tokio::time::sleep(Duration::from_millis(10)).await;
        hub.sign_in(Session::new("user-43"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscription_accepts_callback_that_is_not_sync() {
        let hub = SessionHub::new();
        let resolver = resolver_with(&hub, Arc::new(MemoryStore::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let seen = std::cell::Cell::new(0u32);

        let _subscription = resolver.subscribe(move |identity| {
            seen.set(seen.get() + 1);
            let _ = tx.send((seen.get(), identity.unwrap()));
        });

        let (count, initial) = rx.recv().await.unwrap();
        assert_eq!(count, 1);
        assert!(initial.is_anonymous);

        hub.sign_in(Session::new("user-42"));
        assert_eq!(rx.recv().await.unwrap(), (2, Identity::authenticated("user-42")));
    }

    #[tokio::test]
    async fn test_subscription_reports_missing_storage() {
        let hub = SessionHub::new();
        let resolver = IdentityResolver::new(Arc::new(hub), None, KEY);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _subscription = resolver.subscribe(move |identity| {
            let _ = tx.send(identity.is_err());
        });

        assert!(rx.recv().await.unwrap());
    }
}
