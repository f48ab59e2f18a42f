use std::sync::Arc;
use std::time::Duration;

use common::err::CacheError;
use db_adapter::DbAdapter;
use tokio::task::LocalSet;
use tracing::info;

use crate::config::CacheConfig;
use crate::listener::spawn_accept_loops;
use crate::registry::TableRegistry;
use crate::schema::build_schema_json;

/// Runs the cache server to completion: starts the Reload Scheduler on its
/// own OS thread (§4.5), runs the single-threaded serving event loop on a
/// current-thread Tokio runtime (§4.6), and blocks until SIGINT/SIGTERM or a
/// client `quit` request trigger an orderly shutdown (§5).
pub fn run(config: CacheConfig, adapter: Box<dyn DbAdapter>) -> Result<(), CacheError> {
    let registry = Arc::new(TableRegistry::build(&config)?);
    let schema_json = Arc::new(build_schema_json(&config));

    let (scheduler_handle, scheduler_tx) = cache_table::ReloadScheduler::spawn(
        registry.all().to_vec(),
        adapter,
        scheduler_tick_period(&config),
        config.strip_null,
    );

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(CacheError::Io)?;
    let local = LocalSet::new();

    local.block_on(&runtime, async {
        let (quit_tx, mut quit_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        spawn_accept_loops(&config.listen, registry.clone(), schema_json.clone(), quit_tx).await?;

        tokio::select! {
            _ = wait_for_signal() => {
                info!("received shutdown signal");
            }
            _ = quit_rx.recv() => {
                info!("client requested shutdown, draining for 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        Ok::<(), CacheError>(())
    })?;

    let _ = scheduler_tx.send(cache_table::SchedulerMessage::Stop);
    let _ = scheduler_handle.join();
    info!("shutdown complete");
    Ok(())
}

/// The scheduler thread sleeps for this long between ticks, so it must be at
/// most the shortest refresh period any configured table actually wants —
/// otherwise a table configured faster than the default would only ever be
/// checked as often as the default allows.
fn scheduler_tick_period(config: &CacheConfig) -> Duration {
    config
        .tables
        .iter()
        .map(|t| t.refresh_period(config.default_refresh_period_secs))
        .min()
        .unwrap_or_else(|| Duration::from_secs(config.default_refresh_period_secs))
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexConfig, TableConfig};

    #[test]
    fn tick_period_is_the_fastest_table_not_the_default() {
        let mut config = CacheConfig { default_refresh_period_secs: 60, ..CacheConfig::default() };
        config.tables.push(TableConfig {
            id: 1,
            name: "slow".into(),
            refresh_period_secs: None,
            indexes: vec![IndexConfig { id: 0, column: "id".into(), column_type: "int".into() }],
        });
        config.tables.push(TableConfig {
            id: 2,
            name: "fast".into(),
            refresh_period_secs: Some(1),
            indexes: vec![IndexConfig { id: 0, column: "id".into(), column_type: "int".into() }],
        });

        assert_eq!(scheduler_tick_period(&config), Duration::from_secs(1));
    }

    #[test]
    fn tick_period_falls_back_to_the_default_with_no_tables() {
        let config = CacheConfig { default_refresh_period_secs: 7, ..CacheConfig::default() };
        assert_eq!(scheduler_tick_period(&config), Duration::from_secs(7));
    }
}
