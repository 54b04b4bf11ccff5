use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::auth::{auth_middleware, AuthService};
use crate::storage::Storage;

use super::analytics::{destination_analytics, overview_analytics, short_link_analytics};
use super::handlers::{
    create_destination, create_short_link, delete_destination, delete_short_link,
    get_destination, get_short_link, health_check, list_destinations, list_short_links,
    short_link_qr, update_destination, update_short_link, AppState,
};

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    auth_service: Arc<AuthService>,
    public_base_url: String,
) -> Router {
    let state = Arc::new(AppState {
        storage,
        public_base_url,
    });

    let protected_routes = Router::new()
        .route("/api/destinations", post(create_destination))
        .route("/api/destinations", get(list_destinations))
        .route("/api/destinations/{id}", get(get_destination))
        .route("/api/destinations/{id}", put(update_destination))
        .route("/api/destinations/{id}", delete(delete_destination))
        .route("/api/shortlinks", post(create_short_link))
        .route("/api/shortlinks/destination/{id}", get(list_short_links))
        .route("/api/shortlinks/{id}", get(get_short_link))
        .route("/api/shortlinks/{id}", put(update_short_link))
        .route("/api/shortlinks/{id}", delete(delete_short_link))
        .route("/api/shortlinks/{id}/qr", get(short_link_qr))
        .route("/api/analytics/shortlinks/{id}", get(short_link_analytics))
        .route(
            "/api/analytics/destinations/{id}",
            get(destination_analytics),
        )
        .route("/api/analytics/overview", get(overview_analytics))
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
}
