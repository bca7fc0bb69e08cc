use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::auth::require_admin;
use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{forms, health_check, register, registrations, session, verify};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    // Everything under /api/admin sits behind the session middleware; login
    // stays outside so a session can be opened in the first place.
    let admin = Router::new()
        .route("/logout", post(session::logout))
        .route("/registrations", get(registrations::list))
        .route(
            "/registrations/:id",
            get(registrations::get_one)
                .put(registrations::update)
                .delete(registrations::remove),
        )
        .route("/registrations/:id/history", get(registrations::history))
        .route("/generate-qr/:id", post(registrations::generate_qr))
        .route("/revoke-qr/:id", post(registrations::revoke_qr))
        .route("/forms", get(forms::list).post(forms::create))
        .route(
            "/forms/:id",
            get(forms::get_one).put(forms::update).delete(forms::remove),
        )
        .route("/forms/:id/publish", post(forms::publish))
        .route("/forms/:id/stats", get(forms::stats))
        .route("/forms/:id/export", get(forms::export))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/register", post(register::register))
        .route("/api/form", get(register::published_form))
        .route("/api/verify", get(verify::verify))
        .route("/api/admin/login", post(session::login))
        .nest("/api/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(state.config.hsts_enabled))
        .layer(create_cors_layer(&state.config.cors_allowed_origins))
        .with_state(state)
}
