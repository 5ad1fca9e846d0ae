//! Application state for the admin console.
//!
//! Owns the session and the API client bound to it. The session is optional:
//! a console started with `--no-session` talks to the backend anonymously and
//! never touches token storage.

use std::sync::Arc;

use crate::api::client::ApiClient;
use crate::config::{Config, ConfigError, SessionBackend};
use crate::session::{
    FileStore, KeychainStore, MemoryStore, Session, SessionObserver, SessionStore, StoreError,
    TokenState,
};

pub struct AppState {
    /// HTTP client for backend communication.
    pub api: Arc<ApiClient>,
    /// Session shared with `api`, if any.
    pub session: Option<Arc<Session>>,
    pub config: Config,
}

impl AppState {
    /// Build state from configuration. The store is chosen by
    /// `config.session_backend`; only the file backend needs a directory.
    pub fn new(config: Config, with_session: bool) -> Result<Self, ConfigError> {
        let session = if with_session {
            let store: Arc<dyn SessionStore> = match config.session_backend {
                SessionBackend::File => {
                    let dir = config.session_dir.clone().ok_or(ConfigError::NoSessionDir)?;
                    Arc::new(FileStore::new(dir))
                }
                SessionBackend::Keychain => Arc::new(KeychainStore::new()),
                SessionBackend::Memory => Arc::new(MemoryStore::new()),
            };
            Some(Arc::new(Session::new(store, config.login_path.clone())))
        } else {
            None
        };
        Ok(Self::with_session(config, session))
    }

    /// Build state around an existing session.
    pub fn with_session(config: Config, session: Option<Arc<Session>>) -> Self {
        let api = Arc::new(ApiClient::from_config(&config, session.clone()));
        Self {
            api,
            session,
            config,
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        if let Some(session) = &self.session {
            session.subscribe(observer);
        }
    }

    /// Startup token check. Without a session there is nothing to check.
    pub fn check_session(&self) -> Result<TokenState, StoreError> {
        match &self.session {
            Some(session) => session.check_on_startup(),
            None => Ok(TokenState::Absent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::observer::RecordingObserver;
    use crate::session::token::token_expiring_in;
    use crate::session::TOKEN_KEY;

    fn config(dir: &std::path::Path) -> Config {
        Config::from_lookup(|name| match name {
            "MOC_SESSION_DIR" => Some(dir.to_string_lossy().into_owned()),
            "MOC_API_URL" => Some("http://127.0.0.1:9/api".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_file_backed_state_checks_expired_token_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path())
            .set(TOKEN_KEY, &token_expiring_in(-30))
            .unwrap();

        let state = AppState::new(config(dir.path()), true).unwrap();
        let observer = Arc::new(RecordingObserver::default());
        state.subscribe(observer.clone());

        assert_eq!(state.check_session().unwrap(), TokenState::Expired);
        assert!(!dir.path().join(TOKEN_KEY).exists());
        assert_eq!(observer.events().len(), 1);
        assert_eq!(state.api.base_url(), "http://127.0.0.1:9/api");
    }

    #[test]
    fn test_state_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(dir.path()), false).unwrap();
        assert!(state.session.is_none());
        assert!(state.api.session().is_none());
        assert_eq!(state.check_session().unwrap(), TokenState::Absent);
    }

    #[test]
    fn test_missing_session_dir_only_matters_for_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.session_dir = None;

        assert!(AppState::new(config.clone(), false).is_ok());

        config.session_backend = SessionBackend::Memory;
        let state = AppState::new(config.clone(), true).unwrap();
        assert!(state.session.is_some());

        config.session_backend = SessionBackend::File;
        assert!(matches!(
            AppState::new(config, true),
            Err(ConfigError::NoSessionDir)
        ));
    }
}
