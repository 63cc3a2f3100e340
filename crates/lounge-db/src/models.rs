//! Database row types. These map directly to SQLite rows and stay independent
//! of the lounge-types wire models.

use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// A message joined with its author's username.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub token_hash: String,
    pub member_id: String,
    pub created_at: String,
    pub expires_at: String,
}

/// Canonical stored form of a timestamp. Every column is written through
/// this, so string comparison in SQL orders by time.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Only the [`format_timestamp`] form is accepted. Anything else would sort
/// out of place against stored rows.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}
