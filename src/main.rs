//
// main.rs
// PDT-Tools-rs
//
// Tokio entry point: installs the tracing subscriber and hands off execution to the CLI layer.
//
// Thales Matheus Mendonça Santos - November 2025

use pdt_tools::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON printed by the calculators stays clean on stdout.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdt_tools=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run().await
}
