use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use lounge_types::api::Hello;

use crate::middleware::require_session;
use crate::state::AppState;
use crate::{auth, messages, profile};

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/hello/", get(hello))
        .route("/api/auth/register/", post(auth::register))
        .route("/api/auth/login/", post(auth::login));

    // route_layer so unknown paths still 404 instead of demanding a session
    let protected_routes = Router::new()
        .route("/api/auth/logout/", post(auth::logout))
        .route("/api/auth/me/", get(auth::me))
        .route(
            "/api/profile/",
            get(profile::get_profile)
                .put(profile::update_profile)
                .patch(profile::update_profile),
        )
        .route(
            "/api/messages/",
            get(messages::list_messages).post(messages::create_message),
        )
        .route("/api/messages/create/", post(messages::create_message))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn hello() -> Json<Hello> {
    Json(Hello {
        message: "Hello!".to_string(),
        timestamp: chrono::Utc::now(),
    })
}
