//! Authentication sessions and change notifications.
//!
//! Providers publish [`SessionEvent`]s to every subscriber in the order they
//! happen. Each subscriber owns an unbounded channel, so a slow subscriber
//! never makes the provider drop or merge events. The first event a new
//! subscriber sees is always [`SessionEventKind::InitialSession`] carrying
//! the session at subscription time.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Error;

/// An authenticated session as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), email: None, access_token: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

/// Ordered stream of session events for one subscriber.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Source of the current authentication state.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The session right now, if the visitor is signed in.
    async fn current_session(&self) -> Result<Option<Session>, Error>;

    /// Subscribe to session changes. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> SessionEvents;

    async fn sign_out(&self) -> Result<(), Error>;
}

#[derive(Debug, Default)]
struct HubState {
    session: Option<Session>,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

/// In-process session provider and event fan-out.
///
/// Publishing holds the state lock while sending, so concurrent publishers
/// are observed in the same order by every subscriber.
#[derive(Debug, Clone, Default)]
pub struct SessionHub {
    state: Arc<Mutex<HubState>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        let hub = Self::new();
        hub.state.lock().session = Some(session);
        hub
    }

    pub fn session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    pub fn sign_in(&self, session: Session) {
        self.publish(SessionEventKind::SignedIn, Some(session));
    }

    /// Replace the current session and notify every live subscriber.
    pub fn publish(&self, kind: SessionEventKind, session: Option<Session>) {
        let mut state = self.state.lock();
        state.session = session.clone();

        let event = SessionEvent { kind, session };
        state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::debug!(?kind, subscribers = state.subscribers.len(), "published session event");
    }

    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

#[async_trait]
impl SessionProvider for SessionHub {
    async fn current_session(&self) -> Result<Option<Session>, Error> {
        Ok(self.session())
    }

    fn subscribe(&self) -> SessionEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let initial = SessionEvent { kind: SessionEventKind::InitialSession, session: state.session.clone() };
        if tx.send(initial).is_ok() {
            state.subscribers.push(tx);
        }
        rx
    }

    async fn sign_out(&self) -> Result<(), Error> {
        self.publish(SessionEventKind::SignedOut, None);
        Ok(())
    }
}
