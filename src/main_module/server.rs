use axum::{middleware::from_fn_with_state, routing::get, Router};
use log::{error, info};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{health_check, shutdown_signal};
use crate::activities::configure_activity_routes;
use crate::auth::configure_auth_routes;
use crate::contacts::configure_contact_routes;
use crate::core::middleware::session_middleware;
use crate::core::shared::state::AppState;
use crate::dashboards::configure_dashboards_routes;
use crate::deals::configure_deal_routes;
use crate::invitations::configure_invitation_routes;
use crate::llm::configure_ai_routes;
use crate::tasks::configure_task_routes;
use crate::templates::configure_template_routes;
use crate::whatsapp::configure_whatsapp_routes;

/// The full application: every feature router behind the session layer.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(configure_auth_routes())
        .merge(configure_invitation_routes())
        .merge(configure_contact_routes())
        .merge(configure_activity_routes())
        .merge(configure_task_routes())
        .merge(configure_deal_routes())
        .merge(configure_template_routes())
        .merge(configure_dashboards_routes())
        .merge(configure_whatsapp_routes())
        .merge(configure_ai_routes())
        .route("/health", get(health_check))
        .layer(from_fn_with_state(app_state.clone(), session_middleware))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.server.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {addr}: {e} - is another instance running?");
            return Err(e);
        }
    };
    info!("HTTP server listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
