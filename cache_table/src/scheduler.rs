use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use db_adapter::DbAdapter;
use tracing::{error, warn};

use crate::loader::reload_table;
use crate::table::Table;

pub enum SchedulerMessage {
    Stop,
    Poke,
}

/// Drives all of a process's tables on a single dedicated OS thread (§4.5,
/// §5), separate from the serving event loop so multi-second database calls
/// never stall client-facing I/O.
pub struct ReloadScheduler;

impl ReloadScheduler {
    /// Spawns the scheduler thread. Returns its join handle and a sender the
    /// owner can use to `Poke` an immediate tick or `Stop` it; dropping the
    /// sender also stops the thread once its current tick finishes.
    pub fn spawn(
        tables: Vec<Arc<Table>>,
        mut adapter: Box<dyn DbAdapter>,
        period: Duration,
        strip_null: bool,
    ) -> (JoinHandle<()>, mpsc::Sender<SchedulerMessage>) {
        let (tx, rx) = mpsc::channel::<SchedulerMessage>();
        let handle = thread::Builder::new()
            .name("reload-scheduler".into())
            .spawn(move || loop {
                match rx.recv_timeout(period) {
                    Ok(SchedulerMessage::Stop) => break,
                    Ok(SchedulerMessage::Poke) | Err(RecvTimeoutError::Timeout) => {
                        tick(&tables, adapter.as_mut(), strip_null);
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .expect("failed to spawn reload-scheduler thread");
        (handle, tx)
    }
}

fn tick(tables: &[Arc<Table>], adapter: &mut dyn DbAdapter, strip_null: bool) {
    let now = now_epoch();
    let due: Vec<&Arc<Table>> = tables.iter().filter(|t| t.due_for_reload(now)).collect();
    if due.is_empty() {
        return;
    }
    if let Err(e) = adapter.connect() {
        error!(error = %e, "adapter connect failed, retrying next tick");
        return;
    }
    for table in &due {
        if let Err(e) = reload_table(table, adapter, now, strip_null) {
            warn!(table = %table.name, error = %e, "reload failed, keeping previous snapshot");
        }
    }
    if let Err(e) = adapter.disconnect() {
        warn!(error = %e, "adapter disconnect failed");
    }
}

pub fn now_epoch() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
