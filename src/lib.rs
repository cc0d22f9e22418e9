pub mod backend;
pub mod config;
pub mod server;
pub mod statistics;

use std::sync::Arc;

use self::{config::Config, statistics::Statistics};

/// In order to let the integration test directly use the gateway crate
/// and start the server, a function is opened to replace the main
/// function to directly start the server.
pub async fn startup(config: Arc<Config>) -> anyhow::Result<()> {
    let statistics = Statistics::default();

    server::run(config, statistics).await?;

    // The gateway is non-blocking after it runs and needs to be kept
    // from exiting immediately.
    std::future::pending::<()>().await;

    Ok(())
}
