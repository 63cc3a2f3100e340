use crate::Database;
use crate::models::{MemberRow, MessageRow, SessionRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, ffi};

/// Constraint failures callers need to tell apart from ordinary faults.
/// Carried inside `anyhow::Error`; recover with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreConflict {
    /// A UNIQUE column already holds the value. Carries the column name.
    #[error("unique constraint failed on {0}")]
    Unique(String),
    /// A foreign key points at a row that no longer exists.
    #[error("referenced row does not exist")]
    MissingReference,
}

fn translate(err: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err {
        if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE {
            // "UNIQUE constraint failed: members.username"
            let column = msg.rsplit('.').next().unwrap_or_default().to_string();
            return StoreConflict::Unique(column).into();
        }
        if code.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            return StoreConflict::MissingReference.into();
        }
    }
    err.into()
}

impl Database {
    // -- Members --

    pub fn create_member(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO members (id, username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, username, email, password_hash, created_at),
            )
            .map_err(translate)?;
            Ok(())
        })
    }

    pub fn get_member_by_id(&self, id: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| query_member(conn, MemberKey::Id, id))
    }

    pub fn get_member_by_email(&self, email: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| query_member(conn, MemberKey::Email, email))
    }

    /// True if a member other than `excluding` already uses `username`.
    pub fn username_taken(&self, username: &str, excluding: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM members WHERE username = ?1 AND (?2 IS NULL OR id != ?2))",
                rusqlite::params![username, excluding],
                |row| row.get(0),
            )?)
        })
    }

    /// True if a member other than `excluding` already uses `email`.
    pub fn email_taken(&self, email: &str, excluding: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM members WHERE email = ?1 AND (?2 IS NULL OR id != ?2))",
                rusqlite::params![email, excluding],
                |row| row.get(0),
            )?)
        })
    }

    /// Overwrite whichever of `username` / `email` is given. Returns the
    /// updated row, or `None` if the member does not exist.
    pub fn update_member(
        &self,
        id: &str,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<MemberRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx
                .execute(
                    "UPDATE members
                     SET username = COALESCE(?2, username), email = COALESCE(?3, email)
                     WHERE id = ?1",
                    rusqlite::params![id, username, email],
                )
                .map_err(translate)?;
            if changed == 0 {
                return Ok(None);
            }
            let row = query_member(&tx, MemberKey::Id, id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        author_id: &str,
        text: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, author_id, text, created_at),
            )
            .map_err(translate)?;
            Ok(())
        })
    }

    /// Total message count plus one newest-first window. Both are read under
    /// the same lock so the count matches the rows.
    pub fn list_messages(&self, limit: u32, offset: u64) -> Result<(u64, Vec<MessageRow>)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            let rows = query_messages(conn, limit, offset)?;
            Ok((total.max(0) as u64, rows))
        })
    }

    // -- Sessions --

    pub fn insert_session(
        &self,
        token_hash: &str,
        member_id: &str,
        created_at: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, member_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (token_hash, member_id, created_at, expires_at),
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, token_hash: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token_hash, member_id, created_at, expires_at
                     FROM sessions WHERE token_hash = ?1",
                    [token_hash],
                    |row| {
                        Ok(SessionRow {
                            token_hash: row.get(0)?,
                            member_id: row.get(1)?,
                            created_at: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Returns whether a row was removed.
    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(removed > 0)
        })
    }

    /// Drop every session whose expiry is at or before `now`.
    pub fn delete_expired_sessions(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?)
        })
    }
}

#[derive(Clone, Copy)]
enum MemberKey {
    Id,
    Email,
}

fn query_member(conn: &Connection, key: MemberKey, value: &str) -> Result<Option<MemberRow>> {
    let sql = match key {
        MemberKey::Id => {
            "SELECT id, username, email, password_hash, created_at FROM members WHERE id = ?1"
        }
        MemberKey::Email => {
            "SELECT id, username, email, password_hash, created_at FROM members WHERE email = ?1"
        }
    };
    let mut stmt = conn.prepare(sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(MemberRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages(conn: &Connection, limit: u32, offset: u64) -> Result<Vec<MessageRow>> {
    // JOIN members to fetch the author's username in the same query.
    // rowid breaks ties between messages stamped in the same microsecond.
    let mut stmt = conn.prepare(
        "SELECT m.id, m.author_id, u.username, m.text, m.created_at
         FROM messages m
         LEFT JOIN members u ON m.author_id = u.id
         ORDER BY m.created_at DESC, m.rowid DESC
         LIMIT ?1 OFFSET ?2",
    )?;

    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let rows = stmt
        .query_map(rusqlite::params![limit, offset], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                author_id: row.get(1)?,
                author_username: row
                    .get::<_, Option<String>>(2)?
                    .unwrap_or_else(|| "unknown".to_string()),
                text: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_member(id: &str, username: &str, email: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_member(id, username, email, "hash", "2024-01-01T00:00:00.000000Z")
            .unwrap();
        db
    }

    fn conflict(err: &anyhow::Error) -> Option<&StoreConflict> {
        err.downcast_ref::<StoreConflict>()
    }

    #[test]
    fn duplicate_username_reports_column() {
        let db = db_with_member("m1", "alice", "a@x.com");
        let err = db
            .create_member("m2", "alice", "other@x.com", "hash", "2024-01-01T00:00:01.000000Z")
            .unwrap_err();
        assert_eq!(conflict(&err), Some(&StoreConflict::Unique("username".into())));
    }

    #[test]
    fn duplicate_email_reports_column() {
        let db = db_with_member("m1", "alice", "a@x.com");
        let err = db
            .create_member("m2", "bob", "a@x.com", "hash", "2024-01-01T00:00:01.000000Z")
            .unwrap_err();
        assert_eq!(conflict(&err), Some(&StoreConflict::Unique("email".into())));
    }

    #[test]
    fn taken_checks_respect_exclusion() {
        let db = db_with_member("m1", "alice", "a@x.com");
        assert!(db.username_taken("alice", None).unwrap());
        assert!(!db.username_taken("alice", Some("m1")).unwrap());
        assert!(db.email_taken("a@x.com", Some("m2")).unwrap());
        assert!(!db.email_taken("b@x.com", None).unwrap());
    }

    #[test]
    fn update_member_leaves_absent_fields() {
        let db = db_with_member("m1", "alice", "a@x.com");
        let row = db.update_member("m1", None, Some("new@x.com")).unwrap().unwrap();
        assert_eq!(row.username, "alice");
        assert_eq!(row.email, "new@x.com");

        assert!(db.update_member("missing", Some("zed"), None).unwrap().is_none());
    }

    #[test]
    fn update_member_into_taken_username_conflicts() {
        let db = db_with_member("m1", "alice", "a@x.com");
        db.create_member("m2", "bob", "b@x.com", "hash", "2024-01-01T00:00:01.000000Z")
            .unwrap();
        let err = db.update_member("m2", Some("alice"), None).unwrap_err();
        assert_eq!(conflict(&err), Some(&StoreConflict::Unique("username".into())));
        assert_eq!(db.get_member_by_id("m2").unwrap().unwrap().username, "bob");
    }

    #[test]
    fn message_for_unknown_author_is_missing_reference() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .insert_message("msg1", "ghost", "hi", "2024-01-01T00:00:00.000000Z")
            .unwrap_err();
        assert_eq!(conflict(&err), Some(&StoreConflict::MissingReference));
    }

    #[test]
    fn messages_list_newest_first_with_ties_by_insertion() {
        let db = db_with_member("m1", "alice", "a@x.com");
        db.insert_message("a", "m1", "first", "2024-01-01T00:00:00.000000Z").unwrap();
        db.insert_message("b", "m1", "second", "2024-01-01T00:00:01.000000Z").unwrap();
        db.insert_message("c", "m1", "third", "2024-01-01T00:00:01.000000Z").unwrap();

        let (total, rows) = db.list_messages(10, 0).unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        assert_eq!(rows[0].author_username, "alice");

        let (_, tail) = db.list_messages(2, 2).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].id, "a");
    }

    #[test]
    fn deleting_member_cascades_messages() {
        let db = db_with_member("m1", "alice", "a@x.com");
        db.insert_message("a", "m1", "hello", "2024-01-01T00:00:00.000000Z").unwrap();
        db.with_conn(|conn| {
            conn.execute("DELETE FROM members WHERE id = ?1", ["m1"])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(db.list_messages(10, 0).unwrap().0, 0);
    }

    #[test]
    fn session_lifecycle_and_expiry_purge() {
        let db = db_with_member("m1", "alice", "a@x.com");
        db.insert_session("live", "m1", "2024-01-01T00:00:00.000000Z", "2024-02-01T00:00:00.000000Z")
            .unwrap();
        db.insert_session("stale", "m1", "2023-01-01T00:00:00.000000Z", "2023-02-01T00:00:00.000000Z")
            .unwrap();

        assert_eq!(db.get_session("live").unwrap().unwrap().member_id, "m1");

        let purged = db.delete_expired_sessions("2024-01-15T00:00:00.000000Z").unwrap();
        assert_eq!(purged, 1);
        assert!(db.get_session("stale").unwrap().is_none());

        assert!(db.delete_session("live").unwrap());
        assert!(!db.delete_session("live").unwrap());
    }
}
