use std::sync::Arc;

use anyhow::anyhow;
use chrono::Duration;
use tracing::error;

use lounge_db::Database;

use crate::error::ApiError;
use crate::sessions::SessionStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub sessions: SessionStore,
    pub secure_cookies: bool,
}

/// Session knobs that come from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    /// Mark the session cookie `Secure`; turn on behind HTTPS.
    pub secure_cookies: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::weeks(2),
            secure_cookies: false,
        }
    }
}

impl AppStateInner {
    pub fn new(db: Database, settings: SessionSettings) -> AppState {
        let db = Arc::new(db);
        Arc::new(Self {
            sessions: SessionStore::new(Arc::clone(&db), settings.ttl),
            db,
            secure_cookies: settings.secure_cookies,
        })
    }
}

/// Run blocking DB / hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res,
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Internal(anyhow!("blocking task failed: {}", e)))
        }
    }
}
