use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use db_adapter::{IndexDescriptor, TableDescriptor};

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct TableStats {
    pub last_loaded_epoch: u64,
    pub rows: usize,
    pub min_id: Option<i64>,
    pub max_id: Option<i64>,
}

/// A table with stable identity and the dual-slot snapshot it serves reads
/// from (§3, §4.4). Only one loader ever runs at a time (the single Reload
/// Scheduler thread), so `slots[idle]` is exclusively owned by whichever
/// `TableLoader::reload` call is in flight; readers only ever dereference
/// `slots[current_slot]`, which is immutable once published.
///
/// # Safety
/// `slots` is `UnsafeCell` rather than behind a lock because the entire
/// point of the dual-slot design is that readers never block on the loader.
/// The invariant that makes the raw aliasing sound is: the loader only
/// writes `slots[1 - current_slot]`, and `current_slot` is only advanced
/// (with `Release`) once that write is complete and finalized — so a
/// reader's `Acquire` load of `current_slot` always selects a slot nobody
/// is concurrently mutating. See §9 Open Question (i) for the one
/// accepted gap: a slow reader whose response write outlives the *next*
/// reload of the slot it's reading from.
pub struct Table {
    pub id: u8,
    pub name: String,
    pub refresh_period: Duration,
    pub indexes: Vec<IndexDescriptor>,
    slots: [UnsafeCell<Snapshot>; 2],
    current_slot: AtomicUsize,
    stats: Mutex<TableStats>,
}

unsafe impl Sync for Table {}

impl Table {
    pub fn new(id: u8, name: String, refresh_period: Duration, indexes: Vec<IndexDescriptor>) -> Self {
        let index_count = indexes.len();
        Table {
            id,
            name,
            refresh_period,
            indexes,
            slots: [
                UnsafeCell::new(Snapshot::empty(index_count)),
                UnsafeCell::new(Snapshot::empty(index_count)),
            ],
            current_slot: AtomicUsize::new(0),
            stats: Mutex::new(TableStats::default()),
        }
    }

    pub fn descriptor(&self) -> TableDescriptor {
        TableDescriptor { id: self.id, name: self.name.clone(), indexes: self.indexes.clone() }
    }

    /// The snapshot readers should query right now. Acquire-paired with the
    /// loader's Release store in `publish`.
    pub fn current_snapshot(&self) -> &Snapshot {
        let slot = self.current_slot.load(Ordering::Acquire);
        unsafe { &*self.slots[slot].get() }
    }

    pub fn stats(&self) -> TableStats {
        self.stats.lock().expect("table stats mutex poisoned").clone()
    }

    pub fn due_for_reload(&self, now_epoch: u64) -> bool {
        let last = self.stats.lock().expect("table stats mutex poisoned").last_loaded_epoch;
        now_epoch.saturating_sub(last) >= self.refresh_period.as_secs()
    }

    pub(crate) fn idle_slot_index(&self) -> usize {
        1 - self.current_slot.load(Ordering::Relaxed)
    }

    /// # Safety
    /// Caller (the loader) must be the only thread touching this slot, and
    /// must not hand out the resulting reference to anything that outlives
    /// this reload attempt.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn idle_snapshot_mut(&self) -> &mut Snapshot {
        let idle = self.idle_slot_index();
        &mut *self.slots[idle].get()
    }

    pub(crate) fn publish(&self, idle: usize, stats: TableStats) {
        self.current_slot.store(idle, Ordering::Release);
        *self.stats.lock().expect("table stats mutex poisoned") = stats;
    }
}
