use axum::{routing::get, Router};
use std::sync::Arc;

use crate::analytics::GeoResolver;
use crate::storage::Storage;

use super::handlers::{health_check, redirect_short_link, RedirectState};

pub fn create_redirect_router(storage: Arc<dyn Storage>, geo: Arc<GeoResolver>) -> Router {
    let state = Arc::new(RedirectState { storage, geo });

    Router::new()
        .route("/", get(health_check))
        .route("/{code}", get(redirect_short_link))
        .with_state(state)
}
