//! Page templates.
//!
//! With live reload enabled, templates are read from disk on every render so
//! edits show up on the next reload. Otherwise the templates compiled into
//! the binary are parsed once at startup.

use std::path::PathBuf;

use hotpage::Reloader;
use minijinja::{Environment, Value};

/// Name of the index page template.
pub(crate) const INDEX: &str = "index.html";

const INDEX_SOURCE: &str = include_str!("../web/templates/index.html");

/// Source of page templates.
pub(crate) enum Templates {
    /// Templates loaded from a directory on each render.
    Disk { dir: PathBuf, reloader: Reloader },
    /// Templates parsed once from the embedded sources.
    Embedded(Environment<'static>),
}

impl Templates {
    /// Templates read from `dir` on every render.
    pub(crate) fn from_disk(dir: impl Into<PathBuf>, reloader: Reloader) -> Self {
        Self::Disk {
            dir: dir.into(),
            reloader,
        }
    }

    /// Templates compiled into the binary.
    pub(crate) fn embedded(reloader: &Reloader) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        reloader.register_template(&mut env)?;
        env.add_template(INDEX, INDEX_SOURCE)?;
        Ok(Self::Embedded(env))
    }

    /// Render template `name` with `ctx`.
    pub(crate) fn render(&self, name: &str, ctx: Value) -> Result<String, minijinja::Error> {
        match self {
            Self::Disk { dir, reloader } => {
                let mut env = Environment::new();
                env.set_loader(minijinja::path_loader(dir));
                reloader.register_template(&mut env)?;
                env.get_template(name)?.render(ctx)
            }
            Self::Embedded(env) => env.get_template(name)?.render(ctx),
        }
    }
}
