//! Board server command (`agent-board serve`).

use agent_board::board::server::{ServerConfig, start_server};
use agent_board::config::BoardConfig;
use anyhow::Result;

pub async fn cmd_serve(config: &BoardConfig, dev: bool, open: bool) -> Result<()> {
    for warning in config.toml.validate() {
        tracing::warn!("config: {}", warning);
    }

    start_server(
        ServerConfig {
            port: config.port(),
            dev_mode: dev,
            // No browser inside dev containers.
            open_browser: open && !dev,
        },
        config,
    )
    .await
}
