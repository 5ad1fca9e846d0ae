//! Explicit session object owning the stored access token and snapshot.
//!
//! Token lifecycle: `Absent -> Valid` on login, `Valid -> Expired` lazily once
//! the wall clock passes `exp`, and back to `Absent` on logout, detected
//! expiry, or a backend 401. Expiry and 401 also notify observers.

pub mod observer;
pub mod store;
pub mod token;

pub use observer::{InvalidationReason, SessionInvalidated, SessionObserver};
pub use store::{FileStore, KeychainStore, MemoryStore, SessionStore, StoreError};

use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Storage key for the raw JWT.
pub const TOKEN_KEY: &str = "accessToken";

/// Storage key for the serialized last authentication response.
pub const SNAPSHOT_KEY: &str = "user";

/// Observable state of the stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    Expired,
}

/// Outcome of the pre-flight check for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// No token stored; the request goes out unauthenticated.
    Anonymous,
    /// Valid token to send as `Authorization: Bearer <token>`.
    Bearer(String),
    /// Stored token is expired; the request must not be sent.
    Expired,
}

pub struct Session {
    store: Arc<dyn SessionStore>,
    redirect_to: String,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
}

impl Session {
    /// Create a session over `store`. `redirect_to` is the login entry point
    /// carried by invalidation events.
    pub fn new(store: Arc<dyn SessionStore>, redirect_to: impl Into<String>) -> Self {
        Self {
            store,
            redirect_to: redirect_to.into(),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        match self.observers.write() {
            Ok(mut observers) => observers.push(observer),
            Err(poisoned) => poisoned.into_inner().push(observer),
        }
    }

    pub fn token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(TOKEN_KEY)
    }

    /// Read the stored snapshot. A snapshot that no longer parses reads as
    /// `None`.
    pub fn snapshot<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.store.get(SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                log::warn!("Ignoring unreadable session snapshot: {}", e);
                Ok(None)
            }
        }
    }

    /// Persist a freshly issued token and the response it came with.
    pub fn establish<T: Serialize>(&self, token: &str, snapshot: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(snapshot)?;
        self.store.set(TOKEN_KEY, token)?;
        self.store.set(SNAPSHOT_KEY, &raw)?;
        log::info!("Session established");
        Ok(())
    }

    pub fn state_at(&self, now_ms: u64) -> Result<TokenState, StoreError> {
        Ok(match self.token()? {
            None => TokenState::Absent,
            Some(t) if token::is_expired_at(&t, now_ms) => TokenState::Expired,
            Some(_) => TokenState::Valid,
        })
    }

    pub fn state(&self) -> Result<TokenState, StoreError> {
        self.state_at(token::now_ms())
    }

    /// Pre-flight check for an outgoing request. Does not tear anything down;
    /// the caller decides what to do with [`Authorization::Expired`].
    pub fn authorize(&self) -> Result<Authorization, StoreError> {
        Ok(match self.token()? {
            None => Authorization::Anonymous,
            Some(t) if token::is_expired(&t) => Authorization::Expired,
            Some(t) => Authorization::Bearer(t),
        })
    }

    /// Remove token and snapshot without notifying observers (logout).
    pub fn clear(&self) -> Result<(), StoreError> {
        let token = self.store.remove(TOKEN_KEY);
        let snapshot = self.store.remove(SNAPSHOT_KEY);
        token.and(snapshot)
    }

    /// Tear the session down and notify every observer once.
    ///
    /// Observers are notified even if clearing storage failed; the storage
    /// error is still returned.
    pub fn invalidate(&self, reason: InvalidationReason) -> Result<(), StoreError> {
        log::warn!("Session invalidated: {}", reason);
        let cleared = self.clear();

        let event = SessionInvalidated {
            reason,
            redirect_to: self.redirect_to.clone(),
        };
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for observer in observers {
            observer.session_invalidated(&event);
        }

        cleared
    }

    /// Run once at startup: an already-expired token is torn down before any
    /// request is made.
    pub fn check_on_startup(&self) -> Result<TokenState, StoreError> {
        let state = self.state()?;
        if state == TokenState::Expired {
            self.invalidate(InvalidationReason::Expired)?;
        }
        Ok(state)
    }
}
