use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{access_token_middleware, auth_middleware, metrics_middleware};
use super::{admin, castings, handlers, printings, tasks, tokens};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // No credentials required
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/printings/{name}", get(printings::get_item));

    // Kiosk access token
    let kiosk_routes = Router::new()
        .route("/tasks/{type}/new", post(tasks::create_task))
        .route("/tasks/{type}/{name}", get(tasks::query_task))
        .route("/tasks/{type}/{name}/print", post(tasks::print_task))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            access_token_middleware,
        ));

    // Management token
    let management_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route(
            "/admin/config",
            get(admin::get_admin_config).post(admin::update_admin_config),
        )
        // Access tokens
        .route("/tokens/latest", get(tokens::latest))
        .route("/tokens/{name}", get(tokens::lookup))
        // Tasks
        .route(
            "/tasks/{type}/{name}/printFromConsole",
            post(tasks::print_from_console),
        )
        // Printing
        .route("/printings/fetch", post(printings::fetch))
        .route("/printings/batch_fetch", post(printings::batch_fetch))
        .route("/printings/callback", post(printings::printer_callback))
        .route("/printings/queryAll", get(printings::query_all))
        .route(
            "/printings/getPrinterQueuedJobCount",
            get(printings::get_queued_job_count),
        )
        .route(
            "/printings/setPrinterQueuedJobCount",
            post(printings::set_queued_job_count),
        )
        .route("/printings/{name}/update", post(printings::update_status))
        // Casting
        .route("/castings/{type}/pinned", get(castings::get_pinned))
        .route("/castings/{type}/count", get(castings::count))
        .route("/castings/{type}/operate", post(castings::operate))
        .route("/castings/{type}/list", get(castings::list))
        .route("/castings/{type}/screen", get(castings::screen))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(kiosk_routes)
        .merge(management_routes)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
