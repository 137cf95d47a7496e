//! Visitor identity: who memory, personalization and connection state
//! belong to.
//!
//! - [`IdentityResolver`] picks the authenticated user when a session
//!   exists and a persisted anonymous id otherwise
//! - [`SessionProvider`] / [`SessionHub`] supply and broadcast session state
//! - [`LocalStore`] persists the anonymous id ([`CacheDb`](crate::CacheDb)
//!   or [`MemoryStore`])

pub mod anon;
pub mod resolver;
pub mod session;
pub mod store;

use serde::{Deserialize, Serialize};
use url::Url;

pub use anon::{generate_anonymous_id, is_anonymous_id};
pub use resolver::{IdentityResolver, IdentitySubscription};
pub use session::{Session, SessionEvent, SessionEventKind, SessionEvents, SessionHub, SessionProvider};
pub use store::{LocalStore, MemoryStore};

/// Query parameter under which memory and connection routes expect the id.
pub const USER_ID_PARAM: &str = "userId";

/// The resolved visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub is_anonymous: bool,
}

impl Identity {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), is_anonymous: false }
    }

    pub fn anonymous(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), is_anonymous: true }
    }

    /// Copy of `url` carrying this identity as the `userId` query parameter,
    /// replacing any existing one.
    pub fn append_to(&self, url: &Url) -> Url {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != USER_ID_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut out = url.clone();
        out.set_query(None);
        {
            let mut pairs = out.query_pairs_mut();
            pairs.extend_pairs(kept);
            pairs.append_pair(USER_ID_PARAM, &self.user_id);
        }
        out
    }
}
