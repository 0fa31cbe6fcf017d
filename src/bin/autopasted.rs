use std::time::Duration;

use autopaste::cli::ServiceCli;
use autopaste::config::ServiceConfig;
use clap::Parser;

#[tokio::main]
async fn main() {
    autopaste::init_tracing();

    let cli = ServiceCli::parse();

    let settle = Duration::from_millis(cli.settle_ms);
    let config = match ServiceConfig::from_env(cli.queue_depth, settle) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("autopasted: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = autopaste::service::run(config).await {
        tracing::error!(error = %e, "service failed");
        eprintln!("autopasted: {e}");
        std::process::exit(1);
    }
}
