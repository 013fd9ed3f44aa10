use clap::Parser;
use streamcorr::config::Config;
use streamcorr::coordinator;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(
        host = %config.host,
        port = config.port,
        orphan_timeout_secs = config.orphan_timeout_secs,
        "starting streamcorr",
    );

    let client = reqwest::Client::new();

    let clean_shutdown = coordinator::run(config, client).await;

    if clean_shutdown {
        std::process::exit(0);
    } else {
        tracing::error!("exiting with non-zero status: terminal drain deadline exceeded");
        std::process::exit(1);
    }
}
