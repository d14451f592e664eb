use axum::{
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{admin, panel, public};

pub fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes())
        // Admin API (role-gated by the gatekeeper)
        .merge(admin_routes())
        // Server-rendered panel target (cookie-gated by the gatekeeper)
        .merge(panel_routes())
        // Global middleware
        .layer(axum::middleware::from_fn(crate::middleware::gatekeeper))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_routes() -> Router {
    use public::auth;

    Router::new()
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/onboard", post(auth::onboard))
}

fn admin_routes() -> Router {
    use admin::{dashboard, owners, plan_history, plans};
    use axum::routing::patch;

    Router::new()
        // Owner management
        .route("/api/admin/owner-list", get(owners::owner_list))
        .route("/api/admin/owner-list/view/:username", get(owners::owner_view))
        .route("/api/admin/owner-status/:owner_id", patch(owners::owner_status_toggle))
        // Plan management
        .route("/api/admin/plans/list", get(plans::plan_list))
        .route("/api/admin/plans/create", post(plans::plan_create))
        .route("/api/admin/plans/edit", put(plans::plan_update))
        .route(
            "/api/admin/plans/status",
            get(plans::plan_status_get).patch(plans::plan_status_update),
        )
        // Purchase history
        .route("/api/admin/plans/history", get(plan_history::history_list))
        // Dashboard
        .route("/api/admin/dashboard/stats", get(dashboard::stats))
}

fn panel_routes() -> Router {
    Router::new().route("/:username/panel", get(panel::panel_home))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "StoreHub API",
            "version": version,
            "description": "Back-office API for the StoreHub multi-tenant e-commerce platform",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/api/auth/signin, /api/auth/onboard (public)",
                "admin": "/api/admin/* (requires admin role)",
                "panel": "/:username/panel (cookie session, tenant-isolated)",
            },
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;

    let now = chrono::Utc::now();

    match crate::database::pool::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
