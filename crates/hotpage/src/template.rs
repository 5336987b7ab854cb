//! Template integration.
//!
//! Registers the reload snippet and its helper functions into a
//! caller-owned [`minijinja::Environment`]. Pages include the snippet with
//! `{% include "live_reload.html" %}`; it renders to nothing while live
//! reload is disabled.

use minijinja::Environment;

use crate::reloader::Reloader;

/// Name the reload snippet is registered under.
pub const TEMPLATE_NAME: &str = "live_reload.html";

/// Reload snippet source, compiled into the binary.
const TEMPLATE_SOURCE: &str = include_str!("templates/live_reload.html");

impl Reloader {
    /// Register the reload snippet and helpers into `env`.
    ///
    /// Adds the functions `live_reload_enabled()` and `live_reload_route()`
    /// and the [`TEMPLATE_NAME`] template. The helpers read the reloader's
    /// current state on every render.
    ///
    /// # Errors
    ///
    /// Returns an error if the snippet fails to parse.
    pub fn register_template(&self, env: &mut Environment<'_>) -> Result<(), minijinja::Error> {
        let reloader = self.clone();
        env.add_function("live_reload_enabled", move || reloader.enabled());

        let route = self.route().to_owned();
        env.add_function("live_reload_route", move || route.clone());

        env.add_template(TEMPLATE_NAME, TEMPLATE_SOURCE)
    }
}
