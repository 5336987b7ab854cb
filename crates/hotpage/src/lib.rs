//! Live reload notifier for development HTTP servers.
//!
//! Watches a directory tree by polling and pushes a reload signal to every
//! connected browser over a Server-Sent Events stream. Built for axum:
//!
//! - [`Reloader`]: subscriber registry and broadcast, shared by everything below
//! - [`Reloader::start`]: background watcher polling a [`FileTree`]
//! - [`Reloader::router`] / [`Reloader::handler`]: the SSE endpoint
//! - [`Reloader::cache_layer`]: `Cache-Control` for assets while enabled
//! - [`Reloader::register_template`]: minijinja snippet that opens the stream
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use axum::Router;
//! use hotpage::{FsTree, ReloadConfig, Reloader};
//! use tower_http::services::ServeDir;
//!
//! #[tokio::main]
//! async fn main() {
//!     let reloader = Reloader::new(ReloadConfig {
//!         span: tracing::info_span!("live_reload"),
//!         route: "/dev/reload".to_owned(),
//!         enabled: true,
//!         max_age: Duration::from_secs(3600),
//!     });
//!     reloader.start(FsTree::new("web"));
//!
//!     let app = Router::new()
//!         .merge(reloader.router())
//!         .nest_service("/static", ServeDir::new("web/static"))
//!         .layer(reloader.cache_layer());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     axum::serve(listener, app)
//!         .with_graceful_shutdown(async move {
//!             tokio::signal::ctrl_c().await.ok();
//!             reloader.close();
//!         })
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! FileTree ──poll 500ms──► watcher task
//!                              │ fingerprint changed
//!                              ▼
//!                         Reloader::notify
//!                              │ try_send, one slot per subscriber
//!                 ┌────────────┼────────────┐
//!                 ▼            ▼            ▼
//!            Subscription Subscription Subscription
//!                 │            │            │
//!                 ▼            ▼            ▼
//!            SSE body     SSE body     SSE body ──► browser reloads
//! ```

mod cache;
mod error;
mod fingerprint;
mod handler;
mod reloader;
mod template;
mod watcher;

pub use cache::CacheControl;
pub use error::{StreamError, WatchError};
pub use fingerprint::{FileStamp, FileTree, Fingerprint, FsTree, fingerprint};
pub use handler::{CONNECTED_FRAME, RELOAD_FRAME, stream_events};
pub use reloader::{DEFAULT_ROUTE, ReloadConfig, Reloader, Subscription};
pub use template::TEMPLATE_NAME;
pub use watcher::WATCH_INTERVAL;
