use anyhow::Context;

use storefront_api::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    storefront_observability::init_from_env();

    let config = Config::from_env()?;
    tracing::info!(?config, "starting storefront api");
    let bind_addr = config.bind_addr.clone();

    let app = storefront_api::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
