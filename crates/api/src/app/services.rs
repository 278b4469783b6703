//! Service wiring: store selection, view/annotation services and the
//! background relevance sweeper.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use vigil_infra::{
    AnnotationApplier, InMemorySystemStore, PostgresSystemStore, RelevanceReconciler,
    RelevanceSweeper, RelevanceSweeperHandle, SystemStore, ViewBuilder,
};

use crate::config::{AppConfig, StoreBackend};

/// Store handle shared by every service.
pub type DynStore = Arc<dyn SystemStore>;

/// Services shared by all handlers.
pub struct AppServices {
    pub views: ViewBuilder<DynStore>,
    pub annotations: AnnotationApplier<DynStore>,
    sweeper: Option<RelevanceSweeperHandle>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("sweeper", &self.sweeper)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    pub fn new(store: DynStore) -> Self {
        Self {
            views: ViewBuilder::new(store.clone()),
            annotations: AnnotationApplier::new(store),
            sweeper: None,
        }
    }

    /// In-memory services over an existing store (tests, local dev).
    pub fn in_memory(store: Arc<InMemorySystemStore>) -> Self {
        Self::new(store)
    }

    /// Attach a running sweeper; [`AppServices::trigger_sweep`] wakes it.
    pub fn with_sweeper(mut self, sweeper: RelevanceSweeperHandle) -> Self {
        self.sweeper = Some(sweeper);
        self
    }

    /// Ask the background sweeper for a global relevance pass, if it runs.
    pub fn trigger_sweep(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.trigger();
        }
    }
}

/// Build services from config. Must be called inside a tokio runtime when a
/// sweep interval is configured.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: DynStore = match &config.store {
        StoreBackend::Memory => {
            info!("using in-memory system store");
            InMemorySystemStore::arc()
        }
        StoreBackend::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("failed to connect to postgres")?;
            let store = PostgresSystemStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("failed to apply postgres schema")?;
            info!("using postgres system store");
            Arc::new(store)
        }
    };

    let services = AppServices::new(store.clone());
    let Some(interval) = config.sweep_interval else {
        return Ok(services);
    };
    let handle = RelevanceSweeper::with_interval(interval)
        .spawn(RelevanceReconciler::new(store), tokio::runtime::Handle::current())
        .context("failed to spawn relevance sweeper")?;
    Ok(services.with_sweeper(handle))
}
