//! Cache-Control layer for assets served next to live reload.
//!
//! While live reload is enabled, assets may be cached by the browser and
//! revalidated in the background; a reload picks up fresh copies. While
//! disabled, responses pass through untouched.

use axum::http::{HeaderValue, header};
use tower_http::set_header::{MakeHeaderValue, SetResponseHeaderLayer};

use crate::reloader::Reloader;

/// Produces the `Cache-Control` value while live reload is enabled.
///
/// The enabled flag is read per response, so toggling it at runtime takes
/// effect immediately.
#[derive(Clone, Debug)]
pub struct CacheControl {
    reloader: Reloader,
    value: Option<HeaderValue>,
}

impl CacheControl {
    fn new(reloader: Reloader) -> Self {
        let value = HeaderValue::from_str(&cache_control_value(reloader.max_age_secs())).ok();
        Self { reloader, value }
    }
}

impl<T> MakeHeaderValue<T> for CacheControl {
    fn make_header_value(&mut self, _message: &T) -> Option<HeaderValue> {
        self.value.clone().filter(|_| self.reloader.enabled())
    }
}

/// `Cache-Control` directive for a given max age.
fn cache_control_value(max_age_secs: u64) -> String {
    format!("stale-while-revalidate, max-age={max_age_secs}")
}

impl Reloader {
    /// Layer adding `Cache-Control: stale-while-revalidate, max-age=<secs>`
    /// to responses while live reload is enabled.
    ///
    /// A `Cache-Control` header set by the wrapped service is left alone.
    pub fn cache_layer(&self) -> SetResponseHeaderLayer<CacheControl> {
        SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            CacheControl::new(self.clone()),
        )
    }
}
