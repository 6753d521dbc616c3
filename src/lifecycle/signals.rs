//! OS signal handling.

/// Wait for Ctrl-C (SIGINT).
pub async fn ctrl_c() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    Ok(())
}
