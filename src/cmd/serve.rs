//! HTTP server command — `pcrflow serve`.

use anyhow::Result;
use tracing::warn;

use pcrflow::config::PipelineConfig;
use pcrflow::pipeline::Pipeline;
use pcrflow::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: PipelineConfig,
    port: Option<u16>,
    host: Option<String>,
    dev: bool,
) -> Result<()> {
    for warning in config.validate() {
        warn!("{}", warning);
    }

    let server_config = ServerConfig {
        host: host.unwrap_or_else(|| config.server.host.clone()),
        port: port.unwrap_or(config.server.port),
        dev_mode: dev,
    };

    start_server(Pipeline::with_shell_runner(config), server_config).await
}
