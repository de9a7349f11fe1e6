//! Fleet-admin HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, seeding and the HTTP router, then serves the
//! API and the Prometheus listener until shutdown.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use fleetadmin::app::{AppState, build_router};
use fleetadmin::config::{FleetAdminConfig, StorageBackend};
use fleetadmin::store::memory::InMemoryStore;
use fleetadmin::store::postgres::PostgresStore;
use fleetadmin::store::AdminStore;
use fleetadmin::{bootstrap, observability};
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FleetAdminConfig::from_env_or_yaml().context("fleet admin config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: FleetAdminConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("fleetadmin");
    let state = build_state(&config).await?;
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state.clone());
    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        backend = state.store.backend_name(),
        "fleet admin listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: &FleetAdminConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn AdminStore + Send + Sync> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(PostgresStore::connect(pg).await?)
        }
    };
    if config.session.uses_dev_secret() {
        tracing::warn!("FLEET_ADMIN_SESSION_SECRET is unset; sessions use the built-in dev secret");
    }
    bootstrap::seed(store.as_ref(), config.seed_admin.as_ref()).await?;
    observability::record_user_count(store.count_users().await?);
    Ok(AppState::new(store, &config.session))
}
