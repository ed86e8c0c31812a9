//! Oubli Memory Server
//!
//! Serves memory tools over stdin/stdout, one JSON request per line.

use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oubli_memory::{config::Config, serve::serve, tools::MemoryTools};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries responses, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {:?}", config.data_dir);

    let tools = MemoryTools::new(config)?;

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let answered = serve(&tools, stdin, stdout).await?;

    tracing::info!("Input closed after {} requests", answered);
    Ok(())
}
