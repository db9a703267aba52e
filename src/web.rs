#![cfg(not(tarpaulin_include))]

use pressure_graph::app;
use pressure_graph::config::ServerConfig;
use std::env;

/// Main entry point for the pressure graph web service
///
/// Configuration comes from `PRESSURE_GRAPH_*` environment variables, then
/// from positional arguments: `website [bind-addr] [data-dir]`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = ServerConfig::from_env().with_args(&args);
    log::info!(
        "Starting pressure graph server (data dir: {})",
        config.data_dir.display()
    );

    app::run(config).await
}
