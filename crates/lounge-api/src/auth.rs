use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use tracing::info;

use lounge_types::api::{AuthResponse, LoginRequest, RegisterRequest, StatusMessage};

use crate::credentials;
use crate::error::ApiError;
use crate::middleware::{CurrentMember, SessionToken};
use crate::sessions::{SESSION_COOKIE, expired_cookie, session_cookie};
use crate::state::{AppState, blocking};
use crate::validation::validate_login;

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;

    let db = Arc::clone(&state.db);
    let member = blocking(move || {
        let registration = credentials::validate_registration(&db, req)?;
        credentials::register(&db, registration)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            user: member,
        }),
    ))
}

/// Verify credentials and start a session. Any session the client already
/// carried is destroyed so a login always issues a fresh token.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let creds = validate_login(req)?;
    let previous = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let app = Arc::clone(&state);
    let (member, token) = blocking(move || {
        let member = credentials::authenticate(&app.db, creds)?;
        if let Some(old) = previous {
            app.sessions.destroy(&old)?;
        }
        let token = app.sessions.create(member.id)?;
        Ok((member, token))
    })
    .await?;

    info!(member_id = %member.id, "Member logged in");
    let jar = jar.add(session_cookie(token, state.sessions.ttl(), state.secure_cookies));

    Ok((
        jar,
        Json(AuthResponse {
            message: "Login successful".to_string(),
            user: member,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.clone();
    blocking(move || Ok(sessions.destroy(&token)?)).await?;

    info!(member_id = %member.id, "Member logged out");
    Ok((
        jar.remove(expired_cookie()),
        Json(StatusMessage {
            message: "Logout successful".to_string(),
        }),
    ))
}

pub async fn me(Extension(CurrentMember(member)): Extension<CurrentMember>) -> impl IntoResponse {
    Json(member)
}
