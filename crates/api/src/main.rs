use std::sync::Arc;

use anyhow::Context;

use depot_infra::{
    Config, EngineSettings, InMemoryLedgerStore, InventoryEngine, LedgerStore, PostgresLedgerStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    depot_observability::init();

    let config = Config::from_env().context("failed to load configuration")?;

    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(_) => {
            let pg = PostgresLedgerStore::connect(&config)
                .await
                .context("failed to connect to postgres")?;
            pg.migrate().await.context("failed to apply schema")?;
            tracing::info!("using postgres ledger store");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory ledger store");
            Arc::new(InMemoryLedgerStore::new())
        }
    };

    let engine = Arc::new(InventoryEngine::new(store, EngineSettings::from(&config)));
    let app = depot_api::app::build_app(engine);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
