//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that resolve the
//! connection target, open the database, and wire it into the MCP tool handler.

use crate::config::CairnConfig;
use crate::db::target::{resolve_target, CallerIdentity, StaticCredentials};
use crate::db::{self, Database};
use crate::memory::health::HealthMonitor;
use crate::tools::CairnTools;
use anyhow::{Context, Result};
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: resolve the target, open the DB, check the embedding model.
///
/// Database handles may block on HTTP, so opening runs on the blocking pool.
async fn setup_shared_state(
    config: CairnConfig,
) -> Result<(Arc<dyn Database>, Arc<CairnConfig>, Arc<HealthMonitor>)> {
    let config = Arc::new(config);

    let setup_config = Arc::clone(&config);
    let db = tokio::task::spawn_blocking(move || -> Result<Arc<dyn Database>> {
        let credentials = StaticCredentials::from_config(&setup_config.storage);
        let target = resolve_target(&CallerIdentity::Local, &setup_config.storage, &credentials)?;
        let db = db::open_database(&target).context("failed to open database")?;

        // Check for embedding model mismatch
        if let Ok(Some(stored_model)) = db::migrations::get_embedding_model(db.as_ref()) {
            if stored_model != setup_config.embedding.model {
                tracing::warn!(
                    stored = %stored_model,
                    configured = %setup_config.embedding.model,
                    "embedding model changed, run `cairn embed --all` to update all vectors"
                );
            }
        }
        Ok(db)
    })
    .await
    .context("database setup task failed")??;

    tracing::info!(db = %db.describe(), "database ready");

    let health = Arc::new(HealthMonitor::new(config.health.clone()));
    Ok((db, config, health))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: CairnConfig) -> Result<()> {
    tracing::info!("starting cairn MCP server on stdio");

    let (db, config, health) = setup_shared_state(config).await?;

    let tools = CairnTools::new(db, config, health);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP, mounted at `/mcp`.
pub async fn serve_http(config: CairnConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting cairn MCP server on HTTP");

    let (db, config, health) = setup_shared_state(config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(CairnTools::new(db.clone(), config.clone(), health.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
