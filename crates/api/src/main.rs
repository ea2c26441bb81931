use anyhow::Context;

use ledgerbank_infra::config::AppConfig;
use ledgerbank_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ledgerbank_observability::init(LogFormat::from_env());

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr;

    let app = ledgerbank_api::app::build_app(config)
        .await
        .context("failed to start services")?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
