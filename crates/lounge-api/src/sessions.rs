//! Server-side sessions keyed by an opaque cookie token.
//!
//! The client holds 32 random bytes (base64url). The database only ever sees
//! the SHA-256 digest of that token, so a leaked `sessions` table cannot be
//! replayed as cookies.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use lounge_db::Database;
use lounge_db::models::{format_timestamp, parse_timestamp};
use lounge_types::models::Member;

use crate::credentials::member_from_row;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "sessionid";

const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct SessionStore {
    db: Arc<Database>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(db: Arc<Database>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new session for `member_id` and return the raw token for the
    /// cookie. The token itself is not stored.
    pub fn create(&self, member_id: Uuid) -> anyhow::Result<String> {
        let token = generate_token();
        let now = Utc::now();
        self.db.insert_session(
            &digest(&token),
            &member_id.to_string(),
            &format_timestamp(now),
            &format_timestamp(now + self.ttl),
        )?;
        info!(member_id = %member_id, "Session created");
        Ok(token)
    }

    /// Resolve a token to its member. Expired sessions and sessions whose
    /// member no longer exists are deleted on the way out.
    pub fn resolve(&self, token: &str) -> Result<Member, ApiError> {
        let key = digest(token);
        let session = self.db.get_session(&key)?.ok_or(ApiError::Unauthenticated)?;

        let expired = match parse_timestamp(&session.expires_at) {
            Ok(expires_at) => expires_at <= Utc::now(),
            Err(e) => {
                warn!("Corrupt expires_at '{}' on session: {}", session.expires_at, e);
                true
            }
        };
        if expired {
            self.db.delete_session(&key)?;
            return Err(ApiError::Unauthenticated);
        }

        match self.db.get_member_by_id(&session.member_id)? {
            Some(row) => Ok(member_from_row(row)),
            None => {
                warn!(member_id = %session.member_id, "Session points at a missing member, dropping it");
                self.db.delete_session(&key)?;
                Err(ApiError::Unauthenticated)
            }
        }
    }

    /// Remove the session. Removing an already-gone session is not an error.
    pub fn destroy(&self, token: &str) -> anyhow::Result<()> {
        if self.db.delete_session(&digest(token))? {
            info!("Session destroyed");
        }
        Ok(())
    }

    pub fn purge_expired(&self) -> anyhow::Result<usize> {
        let purged = self.db.delete_expired_sessions(&format_timestamp(Utc::now()))?;
        if purged > 0 {
            info!("Purged {} expired sessions", purged);
        }
        Ok(purged)
    }
}

/// HttpOnly cookie carrying the session token. `Max-Age` matches the
/// server-side row so both expire together.
pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Cookie shape used to tell the client to drop its session cookie. Path must
/// match the one it was set with.
pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials;
    use crate::validation::Registration;

    fn setup(ttl: Duration) -> (Arc<Database>, SessionStore, Member) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let member = credentials::register(
            &db,
            Registration {
                username: "alice".into(),
                email: "a@x.com".into(),
                password: "longpass1".into(),
            },
        )
        .unwrap();
        let store = SessionStore::new(Arc::clone(&db), ttl);
        (db, store, member)
    }

    #[test]
    fn create_resolve_destroy() {
        let (_db, store, member) = setup(Duration::hours(1));
        let token = store.create(member.id).unwrap();
        assert_eq!(store.resolve(&token).unwrap(), member);

        store.destroy(&token).unwrap();
        assert!(matches!(store.resolve(&token), Err(ApiError::Unauthenticated)));
        // second destroy is a no-op
        store.destroy(&token).unwrap();
    }

    #[test]
    fn tokens_are_unique_and_not_stored_raw() {
        let (db, store, member) = setup(Duration::hours(1));
        let a = store.create(member.id).unwrap();
        let b = store.create(member.id).unwrap();
        assert_ne!(a, b);
        assert!(db.get_session(&a).unwrap().is_none());
        assert!(db.get_session(&digest(&a)).unwrap().is_some());
    }

    #[test]
    fn unknown_token_is_unauthenticated() {
        let (_db, store, _member) = setup(Duration::hours(1));
        assert!(matches!(store.resolve("garbage"), Err(ApiError::Unauthenticated)));
    }

    #[test]
    fn expired_session_is_rejected_and_removed() {
        let (db, store, member) = setup(Duration::seconds(-1));
        let token = store.create(member.id).unwrap();
        assert!(matches!(store.resolve(&token), Err(ApiError::Unauthenticated)));
        assert!(db.get_session(&digest(&token)).unwrap().is_none());
    }

    #[test]
    fn session_of_deleted_member_is_invalidated() {
        let (db, store, member) = setup(Duration::hours(1));
        let token = store.create(member.id).unwrap();

        db.with_conn(|conn| {
            conn.execute("DELETE FROM members WHERE id = ?1", [member.id.to_string()])?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(store.resolve(&token), Err(ApiError::Unauthenticated)));
        assert!(db.get_session(&digest(&token)).unwrap().is_none());
    }

    #[test]
    fn purge_only_touches_expired() {
        let (db, _, member) = setup(Duration::hours(1));
        let live = SessionStore::new(Arc::clone(&db), Duration::hours(1));
        let dead = SessionStore::new(Arc::clone(&db), Duration::seconds(-1));
        let keep = live.create(member.id).unwrap();
        dead.create(member.id).unwrap();

        assert_eq!(live.purge_expired().unwrap(), 1);
        assert!(live.resolve(&keep).is_ok());
    }

    #[test]
    fn cookie_is_http_only() {
        let cookie = session_cookie("tok".into(), Duration::hours(1), false);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn cookie_lives_as_long_as_the_session() {
        let cookie = session_cookie("tok".into(), Duration::weeks(2), true);
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(14 * 24 * 3600)));
        assert_eq!(cookie.secure(), Some(true));
    }
}
