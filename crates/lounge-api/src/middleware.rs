use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use lounge_types::models::Member;

use crate::error::ApiError;
use crate::sessions::SESSION_COOKIE;
use crate::state::{AppState, blocking};

/// The member behind the request's session. Only present on routes behind
/// [`require_session`]; its presence is the authentication check.
#[derive(Debug, Clone)]
pub struct CurrentMember(pub Member);

/// Raw token from the session cookie, kept so logout can destroy it.
#[derive(Clone)]
pub struct SessionToken(pub String);

/// Resolve the session cookie and stash the member in request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthenticated)?;

    let sessions = state.sessions.clone();
    let lookup = token.clone();
    let member = blocking(move || sessions.resolve(&lookup)).await?;

    req.extensions_mut().insert(CurrentMember(member));
    req.extensions_mut().insert(SessionToken(token));
    Ok(next.run(req).await)
}
