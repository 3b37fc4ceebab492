use std::sync::Arc;

use stockroom_infra::{InMemoryProductStore, ProductStore, StockAdjuster};

use crate::config::ApiConfig;

pub type SharedStore = Arc<dyn ProductStore>;

/// Everything the handlers need, shared behind an `Arc` extension.
pub struct AppServices {
    pub store: SharedStore,
    pub adjuster: StockAdjuster<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            adjuster: StockAdjuster::new(store.clone()),
            store,
        }
    }

    /// Services over an empty in-memory catalog.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryProductStore::new()))
    }
}

/// Pick the store from configuration.
///
/// `DATABASE_URL` selects Postgres (requires the `postgres` feature); without it
/// the catalog lives in memory and is lost on restart.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    match config.database_url.as_deref() {
        None => {
            tracing::info!("using in-memory product store");
            Ok(AppServices::in_memory())
        }
        Some(url) => postgres_services(url, config.db_max_connections).await,
    }
}

#[cfg(feature = "postgres")]
async fn postgres_services(url: &str, max_connections: u32) -> anyhow::Result<AppServices> {
    use anyhow::Context;
    use stockroom_infra::PostgresProductStore;

    let store = PostgresProductStore::connect(url, max_connections)
        .await
        .context("failed to connect to postgres")?;
    store.migrate().await.context("failed to migrate products schema")?;
    tracing::info!(max_connections, "using postgres product store");
    Ok(AppServices::new(Arc::new(store)))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_services(_url: &str, _max_connections: u32) -> anyhow::Result<AppServices> {
    anyhow::bail!("DATABASE_URL is set but this binary was built without the `postgres` feature")
}
