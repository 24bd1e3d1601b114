use axum::Router;

use crate::state::SharedState;

pub mod docs;
#[cfg(feature = "sports-feed")]
pub mod feed;
pub mod health;
pub mod host;
pub mod patron;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(host::router(state.clone()))
        .merge(patron::router());

    #[cfg(feature = "sports-feed")]
    let api_router = api_router.merge(feed::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
