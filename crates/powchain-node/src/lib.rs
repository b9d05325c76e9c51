//! HTTP node around a single in-memory [`powchain_core::Chain`].

pub mod api;
pub mod config;
mod constants;
pub mod error;
pub mod state;
pub mod static_files;

use axum::{
    routing::{any, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::NodeConfig;
pub use error::ApiError;
pub use state::AppState;

/// Build the full router: chain and wallet API plus the static file fallback.
/// `/chain` answers every method; other API paths hit with the wrong method fall
/// through to static serving like any unknown path.
pub fn app(state: AppState) -> Router {
    let cors = state.config().cors;
    let router = Router::new()
        .route("/health", get(api::health))
        .route("/chain", any(api::get_chain))
        .route("/chain/validate", get(api::validate_chain))
        .route("/mine", post(api::mine))
        .route("/add-data", post(api::add_data))
        .route("/wallet/new", post(api::wallet_new))
        .route("/wallet/sign", post(api::wallet_sign))
        .route("/wallet/verify", post(api::wallet_verify))
        .fallback(static_files::serve_static)
        .method_not_allowed_fallback(static_files::serve_static)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
