use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Member;

// -- Auth --

/// Fields are optional at the wire level so that missing ones can be reported
/// per field alongside every other validation problem.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Returned by register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: Member,
}

/// Plain acknowledgement, e.g. for logout.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

// -- Profile --

/// Partial update: absent fields are left untouched. Read-only fields a client
/// echoes back (`id`, `created_at`) are accepted and ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

// -- Messages --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMessagesQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Page-number pagination envelope. `next` and `previous` carry page numbers,
/// or null at either end.
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct Hello {
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_debug_hides_password() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"a@x.com","password":"hunter2hunter2"}"#,
        )
        .unwrap();
        let rendered = format!("{:?}", req);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn register_request_missing_fields_deserialize_as_none() {
        let req: RegisterRequest = serde_json::from_str(r#"{"username":"bob"}"#).unwrap();
        assert_eq!(req.username.as_deref(), Some("bob"));
        assert!(req.email.is_none());
        assert!(req.password.is_none());
    }

    #[test]
    fn profile_update_ignores_read_only_fields() {
        let req: UpdateProfileRequest = serde_json::from_str(
            r#"{"id":"x","username":"carol","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(req.username.as_deref(), Some("carol"));
        assert!(req.email.is_none());
    }

    #[test]
    fn create_message_rejects_unknown_fields() {
        let res: Result<CreateMessageRequest, _> =
            serde_json::from_str(r#"{"text":"hi","author":"someone"}"#);
        assert!(res.is_err());
    }
}
