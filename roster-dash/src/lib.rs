//! roster-dash library - founder roster service
//!
//! Serves the reconciled roster over HTTP: listings, circles, login-code
//! authentication, and override editing.

use axum::Router;
use roster_common::overrides::OverrideStore;
use roster_common::store::KeyValueStore;
use roster_common::RosterContext;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod session;
pub mod sources;

pub use error::{ApiError, ApiResult};

use sources::{LiveFeed, SnapshotSource};

/// Module name reported by `/health`
pub const MODULE_NAME: &str = "roster-dash";

/// Backend type behind the shared override store
pub type DynStore = Box<dyn KeyValueStore + Send>;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<RosterContext>,
    /// The only mutable shared resource; mutated through `merge` / `clear`
    pub overrides: Arc<Mutex<OverrideStore<DynStore>>>,
    pub feed: Arc<dyn LiveFeed>,
    pub snapshot: Arc<dyn SnapshotSource>,
}

impl AppState {
    /// Create application state; overrides are loaded from `store` under the
    /// context's storage key
    pub fn new(
        ctx: RosterContext,
        store: DynStore,
        feed: Arc<dyn LiveFeed>,
        snapshot: Arc<dyn SnapshotSource>,
    ) -> Self {
        let overrides = OverrideStore::load_with_key(store, ctx.overrides_key.clone());
        Self {
            ctx: Arc::new(ctx),
            overrides: Arc::new(Mutex::new(overrides)),
            feed,
            snapshot,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let api = Router::new()
        .route("/api/entities", get(api::list_entities))
        .route("/api/circles", get(api::list_circles))
        .route("/api/auth", post(api::authenticate))
        .route(
            "/api/entities/:identity/override",
            put(api::save_override).delete(api::clear_override),
        );

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
