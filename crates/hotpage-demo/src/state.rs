//! Application state.

use crate::templates::Templates;

/// State shared by the page handlers.
pub(crate) struct AppState {
    /// Page templates.
    pub(crate) templates: Templates,
    /// Title rendered into the index page.
    pub(crate) title: String,
}
