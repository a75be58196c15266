use anyhow::Context;

use stockroom_api::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    stockroom_observability::init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let app = stockroom_api::app::build_app(&config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        low_stock_threshold = config.ledger.low_stock_threshold,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
