use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};

use lounge_types::api::UpdateProfileRequest;

use crate::credentials;
use crate::error::ApiError;
use crate::middleware::CurrentMember;
use crate::state::{AppState, blocking};

pub async fn get_profile(
    Extension(CurrentMember(member)): Extension<CurrentMember>,
) -> impl IntoResponse {
    Json(member)
}

/// Serves both PUT and PATCH; either way only the fields present change.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let db = Arc::clone(&state.db);
    let updated = blocking(move || {
        let changes = credentials::validate_profile_update(&db, member.id, req)?;
        credentials::update_profile(&db, member.id, changes).map_err(|e| match e {
            // Account removed between session check and update.
            ApiError::NotFound => ApiError::Unauthenticated,
            other => other,
        })
    })
    .await?;

    Ok(Json(updated))
}
