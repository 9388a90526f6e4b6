//! Seattle Hotel Agent - a single agent with one tool to find hotels in
//! Seattle, exposed over a local HTTP endpoint.

use std::sync::Arc;

use anyhow::Result;

use stayfinder_core::config::{AppConfig, LoadOptions};
use stayfinder_server::{bootstrap, logging, serve};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    logging::init(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let agent = app.hotel_agent();

    println!(
        "Seattle Hotel Agent Server running on http://{}:{}",
        app.config.server.bind_address, app.config.server.port
    );
    serve::serve(Arc::new(agent), &app.config.server).await
}
