//! Router construction.
//!
//! Builds the axum router with the page, asset and live reload routes.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use hotpage::Reloader;
use minijinja::context;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::templates::INDEX;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `reloader` - Live reload notifier serving the stream and asset caching
/// * `static_dir` - Directory served under `/static`
pub(crate) fn create_router(state: Arc<AppState>, reloader: &Reloader, static_dir: &Path) -> Router {
    let static_routes = Router::new()
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(reloader.cache_layer());

    Router::new()
        .route("/", get(index))
        .with_state(state)
        .merge(reloader.router())
        .merge(static_routes)
        .layer(TraceLayer::new_for_http())
}

/// Render the index page.
async fn index(State(state): State<Arc<AppState>>) -> Response {
    match state
        .templates
        .render(INDEX, context! { title => &state.title })
    {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to render index template");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
