//! Panelgate binary: reads configuration from the environment and serves
//! the front door and the console relay until the process is stopped.

use panelgate::prelude::*;

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,panelgate=debug")
                }),
        )
        .init();

    let config = GatewayConfig::from_env();
    tracing::info!(
        http_addr = %config.http_addr,
        relay_addr = %config.relay_addr,
        panel = ?config.panel,
        diagnostics = config.diagnostics_enabled,
        "configuration loaded"
    );
    if config.panel.base_url.is_none() {
        tracing::warn!("PANEL_URL is not set; credential issuance will fail");
    }

    let panel = HttpPanelClient::new(config.panel.clone())?;
    let server = GatewayServerBuilder::from_config(&config)
        .build(panel)
        .await?;
    server.run().await
}
