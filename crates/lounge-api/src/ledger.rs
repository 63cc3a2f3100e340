//! Append-only message log with page-number pagination.

use chrono::{SubsecRound, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use lounge_db::Database;
use lounge_db::models::{MessageRow, format_timestamp, parse_timestamp};
use lounge_types::api::Page;
use lounge_types::models::{AuthorSummary, Member, Message};

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A normalised page request: `page` is 1-based and `page_size` lies in
/// `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Missing or non-positive values fall back to defaults; oversize pages
    /// are clamped rather than rejected.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => u32::try_from(p).unwrap_or(u32::MAX),
            _ => 1,
        };
        let page_size = match page_size {
            Some(s) if s >= 1 => s.min(MAX_PAGE_SIZE as i64) as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Store `text` (already validated) under `author`. The author was resolved
/// from the caller's session; if it vanished since, the caller is treated as
/// logged out.
pub fn append(db: &Database, author: &Member, text: String) -> Result<Message, ApiError> {
    let id = Uuid::new_v4();
    let created_at = Utc::now().trunc_subsecs(6);

    db.insert_message(
        &id.to_string(),
        &author.id.to_string(),
        &text,
        &format_timestamp(created_at),
    )
    .map_err(ApiError::from)
    .map_err(|e| match e {
        ApiError::NotFound => ApiError::Unauthenticated,
        other => other,
    })?;

    info!(message_id = %id, author_id = %author.id, "Message posted");
    Ok(Message {
        id,
        author: AuthorSummary::from(author),
        text,
        created_at,
    })
}

/// Newest first. A page past the end yields empty `results`, not an error.
pub fn list(db: &Database, req: PageRequest) -> Result<Page<Message>, ApiError> {
    let (count, rows) = db.list_messages(req.page_size, req.offset())?;

    let total_pages = count.div_ceil(u64::from(req.page_size));
    let next = (u64::from(req.page) < total_pages).then(|| req.page + 1);
    let previous = (req.page > 1).then(|| req.page - 1);

    Ok(Page {
        count,
        next,
        previous,
        results: rows.into_iter().map(message_from_row).collect(),
    })
}

fn message_from_row(row: MessageRow) -> Message {
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        author: AuthorSummary {
            id: row.author_id.parse().unwrap_or_else(|e| {
                warn!("Corrupt author_id '{}' on message '{}': {}", row.author_id, row.id, e);
                Uuid::default()
            }),
            username: row.author_username,
        },
        created_at: parse_timestamp(&row.created_at).unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on message '{}': {}", row.created_at, row.id, e);
            chrono::DateTime::default()
        }),
        text: row.text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::credentials;
    use crate::validation::Registration;

    fn member(db: &Database, name: &str) -> Member {
        credentials::register(
            db,
            Registration {
                username: name.to_string(),
                email: format!("{}@x.com", name),
                password: "longpass1".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn page_request_defaults_and_clamps() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, page_size: 20 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, page_size: 20 });
        assert_eq!(PageRequest::new(Some(-4), Some(-1)), PageRequest { page: 1, page_size: 20 });
        assert_eq!(PageRequest::new(Some(2), Some(100)).offset(), 100);
    }

    #[test]
    fn append_embeds_minimal_author() {
        let db = Database::open_in_memory().unwrap();
        let alice = member(&db, "alice");
        let msg = append(&db, &alice, "hello".into()).unwrap();
        assert_eq!(msg.author, AuthorSummary { id: alice.id, username: "alice".into() });
        assert_eq!(msg.text, "hello");

        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["author"].get("email").is_none());
    }

    #[test]
    fn append_for_vanished_author_is_unauthenticated() {
        let db = Database::open_in_memory().unwrap();
        let ghost = Member {
            id: Uuid::new_v4(),
            username: "ghost".into(),
            email: "g@x.com".into(),
            created_at: Utc::now(),
        };
        let err = append(&db, &ghost, "boo".into()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }

    #[test]
    fn pages_concatenate_to_full_history() {
        let db = Database::open_in_memory().unwrap();
        let alice = member(&db, "alice");
        let posted: Vec<Uuid> = (0..7)
            .map(|i| append(&db, &alice, format!("msg {}", i)).unwrap().id)
            .collect();

        let mut seen = Vec::new();
        let mut page = 1;
        loop {
            let res = list(&db, PageRequest::new(Some(page), Some(3))).unwrap();
            assert_eq!(res.count, 7);
            seen.extend(res.results.iter().map(|m| m.id));
            match res.next {
                Some(n) => page = i64::from(n),
                None => break,
            }
        }

        let newest_first: Vec<Uuid> = posted.into_iter().rev().collect();
        assert_eq!(seen, newest_first);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 7);
    }

    #[test]
    fn page_metadata() {
        let db = Database::open_in_memory().unwrap();
        let alice = member(&db, "alice");
        for i in 0..5 {
            append(&db, &alice, format!("msg {}", i)).unwrap();
        }

        let first = list(&db, PageRequest::new(Some(1), Some(2))).unwrap();
        assert_eq!((first.next, first.previous), (Some(2), None));

        let last = list(&db, PageRequest::new(Some(3), Some(2))).unwrap();
        assert_eq!(last.results.len(), 1);
        assert_eq!((last.next, last.previous), (None, Some(2)));
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let alice = member(&db, "alice");
        append(&db, &alice, "only".into()).unwrap();

        let res = list(&db, PageRequest::new(Some(9), None)).unwrap();
        assert_eq!(res.count, 1);
        assert!(res.results.is_empty());
        assert!(res.next.is_none());
    }

    #[test]
    fn empty_ledger() {
        let db = Database::open_in_memory().unwrap();
        let res = list(&db, PageRequest::default()).unwrap();
        assert_eq!(res.count, 0);
        assert!(res.results.is_empty());
        assert_eq!((res.next, res.previous), (None, None));
    }
}
