use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use lounge_types::api::{CreateMessageRequest, ListMessagesQuery};

use crate::error::ApiError;
use crate::ledger::{self, PageRequest};
use crate::middleware::CurrentMember;
use crate::state::{AppState, blocking};
use crate::validation::validate_message;

/// Any authenticated member can read the whole room; there are no per-member
/// ACLs.
pub async fn list_messages(
    State(state): State<AppState>,
    query: Result<Query<ListMessagesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::new(query.page, query.page_size);

    let db = Arc::clone(&state.db);
    let page = blocking(move || ledger::list(&db, page)).await?;

    Ok(Json(page))
}

pub async fn create_message(
    State(state): State<AppState>,
    Extension(CurrentMember(author)): Extension<CurrentMember>,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let text = validate_message(req)?;

    let db = Arc::clone(&state.db);
    let message = blocking(move || ledger::append(&db, &author, text)).await?;

    Ok((StatusCode::CREATED, Json(message)))
}
