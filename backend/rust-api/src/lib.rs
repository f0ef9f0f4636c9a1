#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to the console origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Student/portal endpoints (require JWT)
        .nest(
            "/api/v1",
            api_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        // Admin console endpoints (JWT + admin role)
        .nest(
            "/admin",
            admin_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        // Catalog
        .route("/courses", get(handlers::courses::list_courses))
        .route(
            "/courses/{id}/chapters",
            get(handlers::courses::course_chapters),
        )
        // Enrollment ledger
        .route(
            "/enrollments",
            get(handlers::enrollments::list_enrollments).post(handlers::enrollments::enroll),
        )
        // Chapter progress
        .route(
            "/chapters/{id}/start",
            post(handlers::progress::start_chapter),
        )
        .route(
            "/chapters/{id}/complete",
            post(handlers::progress::complete_chapter),
        )
        // Quiz attempts
        .route(
            "/quizzes/{id}/attempts",
            get(handlers::attempts::list_attempts).post(handlers::attempts::submit_attempt),
        )
        // Mini-project track
        .route(
            "/projects/{id}/enroll",
            post(handlers::projects::enroll_project),
        )
        .route(
            "/projects/{id}/tickets",
            get(handlers::projects::project_tickets),
        )
        .route(
            "/tickets/{id}/start",
            post(handlers::projects::start_ticket),
        )
        .route(
            "/tickets/{id}/complete",
            post(handlers::projects::complete_ticket),
        )
        // Achievements & activity feed
        .route(
            "/achievements",
            get(handlers::achievements::list_achievements),
        )
        .route("/activity", get(handlers::achievements::list_activity))
        // Chat
        .route(
            "/chat/messages",
            get(handlers::chat::conversation).post(handlers::chat::send_message),
        )
        .route("/chat/unread", get(handlers::chat::unread_counts))
        .route("/chat/read", post(handlers::chat::mark_read))
        // Notifications
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/notifications/{id}/read",
            post(handlers::notifications::mark_notification_read),
        )
        // AI recommendations
        .route(
            "/recommendations",
            get(handlers::recommendations::get_recommendations),
        )
        .route(
            "/recommendations/health",
            get(handlers::recommendations::recommender_health),
        )
}

fn admin_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/students/{id}/progress",
            get(handlers::admin::student_progress),
        )
        .route(
            "/students/{id}/activity",
            get(handlers::admin::student_activity),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
}
