//! spoint - MCP server for a SharePoint site
//!
//! This binary runs as an MCP server using stdio transport.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `SP_SITE_URL`: URL of the SharePoint site
//! - `SP_PRODUCTION_HOSTS`: comma-separated hosts that are real SharePoint
//! - `SP_ACCESS_TOKEN` or `SP_COOKIE`: credentials
//!
//! # Usage
//!
//! ```bash
//! SP_SITE_URL=https://contoso.sharepoint.com/sites/Team/ \
//! SP_PRODUCTION_HOSTS=contoso.sharepoint.com SP_ACCESS_TOKEN=xxx ./spoint
//! ```

use anyhow::{Context, Result};
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{fmt, EnvFilter};

use spoint::{config, server, sp_client};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout is reserved for MCP JSON-RPC messages
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spoint=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting spoint MCP server v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::from_env().context("Failed to load configuration")?;

    tracing::debug!("Configuration loaded, site_url: {}", config.site_url);

    let client = sp_client::SpClient::new(&config).context("Failed to create SharePoint client")?;

    tracing::info!(environment = ?client.environment(), "Testing connection to SharePoint...");
    if let Err(e) = client.test_connection().await {
        tracing::error!(error = %e, "Connection test failed");
        // The site might become reachable later
        tracing::warn!(
            "Server will start but may not be able to reach SharePoint. \
             Check configuration and network connectivity."
        );
    }

    // Starts the periodic refresh even if this first fetch fails
    if let Err(e) = client.get_form_digest().await {
        tracing::warn!(
            error = %client.sanitize_error(&e),
            "No form digest yet - writes will fail until a refresh succeeds"
        );
    }

    let server = server::SpointServer::new(client);

    tracing::info!("Server initialized, starting stdio transport");

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })
        .context("Failed to start server")?;

    tracing::info!("Server running, waiting for requests");

    service
        .waiting()
        .await
        .context("Server error during operation")?;

    tracing::info!("Server shutting down");

    Ok(())
}
