use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use lounge_db::StoreConflict;
use lounge_types::api::ErrorResponse;

use crate::validation::FieldErrors;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// One or more fields broke a format rule. Carries every problem found.
    #[error("validation failed")]
    InvalidField(FieldErrors),

    /// The named fields collide with another member's values.
    #[error("duplicate value for {}", .0.join(", "))]
    DuplicateField(Vec<String>),

    /// Unknown email or wrong password; deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No session, or one that is unknown, expired, or orphaned.
    #[error("authentication required")]
    Unauthenticated,

    #[error("not found")]
    NotFound,

    /// Body or query string could not be decoded at all.
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreConflict>() {
            Some(StoreConflict::Unique(field)) => ApiError::DuplicateField(vec![field.clone()]),
            Some(StoreConflict::MissingReference) => ApiError::NotFound,
            None => ApiError::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

pub fn duplicate_message(field: &str) -> String {
    format!("User with this {} already exists", field)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, summary, details) = match self {
            ApiError::InvalidField(errors) => {
                (StatusCode::BAD_REQUEST, "Validation failed", errors.into_map())
            }
            ApiError::DuplicateField(fields) => {
                let details = fields
                    .into_iter()
                    .map(|field| {
                        let msg = duplicate_message(&field);
                        (field, vec![msg])
                    })
                    .collect();
                (StatusCode::BAD_REQUEST, "Validation failed", details)
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid credentials",
                non_field("Invalid email or password"),
            ),
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Authentication required", BTreeMap::new())
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found", BTreeMap::new()),
            ApiError::Malformed(reason) => {
                (StatusCode::BAD_REQUEST, "Malformed request", non_field(&reason))
            }
            ApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", BTreeMap::new())
            }
        };

        let body = ErrorResponse {
            error: summary.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

fn non_field(msg: &str) -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([("non_field_errors".to_string(), vec![msg.to_string()])])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_conflict_becomes_duplicate_field() {
        let err: ApiError = anyhow::Error::from(StoreConflict::Unique("email".into())).into();
        assert!(matches!(err, ApiError::DuplicateField(ref f) if f == &["email"]));
    }

    #[test]
    fn plain_failure_stays_internal() {
        let err: ApiError = anyhow::anyhow!("disk on fire").into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (ApiError::InvalidField(FieldErrors::default()), StatusCode::BAD_REQUEST),
            (ApiError::DuplicateField(vec!["username".into()]), StatusCode::BAD_REQUEST),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::Malformed("bad".into()), StatusCode::BAD_REQUEST),
            (ApiError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
