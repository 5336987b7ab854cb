//! Server-Sent Events handler for live reload.
//!
//! Each connection subscribes to the [`Reloader`] and receives a
//! `data: reload` event per signal. The subscription lives inside the
//! response body, so it is released whenever the body is dropped: client
//! disconnect, server shutdown, or the reloader closing.

use std::convert::Infallible;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Version, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, any};
use futures::{Stream, StreamExt, stream};

use crate::error::StreamError;
use crate::reloader::{Reloader, Subscription};

/// Comment sent when the stream opens.
pub const CONNECTED_FRAME: &str = ": connected\n\n";

/// Event sent for every reload signal.
pub const RELOAD_FRAME: &str = "data: reload\n\n";

/// Handle a live reload stream request.
///
/// Mount with [`axum::routing::any`] so non-`GET` requests reach the handler
/// and get a 405, or use [`Reloader::handler`].
pub async fn stream_events(
    State(reloader): State<Reloader>,
    method: Method,
    version: Version,
) -> Result<Response, StreamError> {
    if method != Method::GET {
        return Err(StreamError::MethodNotAllowed);
    }

    if !supports_streaming(version) {
        tracing::warn!(?version, "Live reload stream needs HTTP/1.1 or newer");
        return Err(StreamError::StreamingUnsupported(version));
    }

    let subscription = reloader.subscribe();
    if subscription.is_closed() {
        tracing::debug!("Live reload stream requested after shutdown");
        return Err(StreamError::Gone);
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(event_stream(subscription)),
    )
        .into_response())
}

/// Whether a response body can be flushed to the client chunk by chunk.
///
/// HTTP/1.0 has no chunked transfer coding and HTTP/0.9 no headers at all.
fn supports_streaming(version: Version) -> bool {
    !matches!(version, Version::HTTP_09 | Version::HTTP_10)
}

/// Body frames for one connection: the opening comment, then one event per
/// signal until the subscription closes.
fn event_stream(
    subscription: Subscription,
) -> impl Stream<Item = Result<&'static str, Infallible>> + Send + 'static {
    stream::once(async { CONNECTED_FRAME })
        .chain(subscription.map(|()| RELOAD_FRAME))
        .map(Ok)
}

impl Reloader {
    /// The stream handler bound to this reloader, for mounting into an
    /// application router.
    pub fn handler<S>(&self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        any(stream_events).with_state(self.clone())
    }

    /// Router serving the stream handler at the configured route.
    ///
    /// # Panics
    ///
    /// Panics if the configured route does not start with `/`.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        Router::new().route(self.route(), self.handler())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use axum::body::BodyDataStream;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use tokio::time;
    use tower::ServiceExt;

    use crate::fingerprint::FsTree;
    use crate::reloader::ReloadConfig;
    use crate::watcher::WATCH_INTERVAL;

    fn reloader() -> Reloader {
        Reloader::new(ReloadConfig {
            enabled: true,
            ..ReloadConfig::default()
        })
    }

    fn request(method: Method, version: Version) -> Request<Body> {
        Request::builder()
            .method(method)
            .version(version)
            .uri("/dev/reload")
            .body(Body::empty())
            .unwrap()
    }

    async fn open_stream(reloader: &Reloader) -> BodyDataStream {
        let response = reloader
            .router::<()>()
            .oneshot(request(Method::GET, Version::HTTP_11))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.into_body().into_data_stream()
    }

    async fn next_frame(body: &mut BodyDataStream) -> Option<String> {
        time::timeout(Duration::from_secs(2), body.next())
            .await
            .expect("timed out waiting for frame")
            .map(|frame| String::from_utf8(frame.unwrap().to_vec()).unwrap())
    }

    async fn no_frame_within(body: &mut BodyDataStream, wait: Duration) -> bool {
        time::timeout(wait, body.next()).await.is_err()
    }

    #[tokio::test]
    async fn test_stream_headers() {
        let reloader = reloader();

        let response = reloader
            .router::<()>()
            .oneshot(request(Method::GET, Version::HTTP_11))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()[header::CONNECTION], "keep-alive");
    }

    #[tokio::test]
    async fn test_stream_sends_connected_then_reload() {
        let reloader = reloader();
        let mut body = open_stream(&reloader).await;

        assert_eq!(next_frame(&mut body).await.as_deref(), Some(": connected\n\n"));

        reloader.notify();
        assert_eq!(next_frame(&mut body).await.as_deref(), Some("data: reload\n\n"));

        reloader.notify();
        assert_eq!(next_frame(&mut body).await.as_deref(), Some("data: reload\n\n"));
    }

    #[tokio::test]
    async fn test_stream_coalesces_unread_signals() {
        let reloader = reloader();
        let mut body = open_stream(&reloader).await;
        assert_eq!(next_frame(&mut body).await.as_deref(), Some(": connected\n\n"));

        reloader.notify();
        reloader.notify();
        reloader.notify();

        assert_eq!(next_frame(&mut body).await.as_deref(), Some("data: reload\n\n"));
        assert!(no_frame_within(&mut body, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_non_get_is_rejected_without_subscribing() {
        let reloader = reloader();

        for method in [Method::POST, Method::HEAD, Method::PUT, Method::DELETE] {
            let response = reloader
                .router::<()>()
                .oneshot(request(method, Version::HTTP_11))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        }
        assert_eq!(reloader.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_http10_cannot_stream() {
        let reloader = reloader();

        let response = reloader
            .router::<()>()
            .oneshot(request(Method::GET, Version::HTTP_10))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reloader.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_http2_can_stream() {
        let reloader = reloader();

        let response = reloader
            .router::<()>()
            .oneshot(request(Method::GET, Version::HTTP_2))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_closed_reloader_returns_gone() {
        let reloader = reloader();
        reloader.close();

        let response = reloader
            .router::<()>()
            .oneshot(request(Method::GET, Version::HTTP_11))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn test_dropping_body_releases_subscription() {
        let reloader = reloader();
        let mut body = open_stream(&reloader).await;
        next_frame(&mut body).await;
        assert_eq!(reloader.subscriber_count(), 1);

        drop(body);

        assert_eq!(reloader.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_ends_every_stream() {
        let reloader = reloader();
        let mut first = open_stream(&reloader).await;
        let mut second = open_stream(&reloader).await;
        next_frame(&mut first).await;
        next_frame(&mut second).await;

        reloader.close();

        assert_eq!(next_frame(&mut first).await, None);
        assert_eq!(next_frame(&mut second).await, None);
        assert_eq!(reloader.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_handler_mounts_on_custom_route() {
        let reloader = Reloader::new(ReloadConfig {
            route: "/__reload".to_owned(),
            ..ReloadConfig::default()
        });
        let app: Router = Router::new().route("/__reload", reloader.handler());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/__reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_file_change_reaches_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "abc").unwrap();

        let reloader = reloader();
        reloader.start(FsTree::new(dir.path()));
        let mut body = open_stream(&reloader).await;
        assert_eq!(next_frame(&mut body).await.as_deref(), Some(": connected\n\n"));

        time::sleep(Duration::from_millis(100)).await;
        fs::write(&path, "abcde").unwrap();

        let frame = time::timeout(WATCH_INTERVAL * 3, body.next()).await;
        let frame = frame.unwrap().unwrap().unwrap();
        assert_eq!(&frame[..], b"data: reload\n\n");
        assert!(no_frame_within(&mut body, WATCH_INTERVAL * 2).await);

        reloader.close();
        assert_eq!(next_frame(&mut body).await, None);
    }
}
