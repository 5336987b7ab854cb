//! hotpage demo server.
//!
//! Serves a single templated page and its static assets, reloading the
//! browser whenever anything under the watched directory changes.

mod app;
mod error;
mod output;
mod serve;
mod state;
mod templates;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use output::Output;
use serve::ServeArgs;

/// hotpage demo - live reload for a static page.
#[derive(Parser)]
#[command(name = "hotpage-demo", version, about)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.serve.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    if let Err(err) = rt.block_on(cli.serve.execute()) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
