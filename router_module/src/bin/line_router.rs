use std::env;

use tracing::info;

use router_module::config::{load_router_config, resolve_router_config_path};
use router_module::service::run_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_target(false).init();
    dotenvy::dotenv().ok();

    let config_path = resolve_router_config_path(env::args().nth(1));
    let config = load_router_config(&config_path)?;
    info!(
        "line router config path={}, port={}",
        config_path.display(),
        config.port
    );

    run_server(config, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await
}
