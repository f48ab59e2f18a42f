use common::CResult;
use db_adapter::{DbAdapter, IndexColumnType};
use hash_index::HashIndex;
use tracing::{info, warn};

use crate::encode::{encode_row, extract_key, int_key_to_i64};
use crate::table::{Table, TableStats};

/// Rebuilds a table's idle slot from `adapter` and atomically publishes it,
/// following §4.4. Returns `Ok(false)` without touching anything if the
/// table isn't due yet. On any adapter or allocation failure the idle slot
/// is left in whatever partial state it reached, `current_slot` is not
/// flipped, and `last_loaded_epoch` is not advanced — the next scheduler
/// tick will retry.
pub fn reload_table(
    table: &Table,
    adapter: &mut dyn DbAdapter,
    now_epoch: u64,
    strip_null: bool,
) -> CResult<bool> {
    if !table.due_for_reload(now_epoch) {
        return Ok(false);
    }

    let span = tracing::info_span!("reload_table", table = %table.name, table_id = table.id);
    let _enter = span.enter();

    let idle = table.idle_slot_index();
    // Safety: we are the single loader thread, and this slot is not
    // `current_slot`, so no reader can be observing it.
    let snapshot = unsafe { table.idle_snapshot_mut() };
    snapshot.arena.reset();

    let descriptor = table.descriptor();
    let row_count = match adapter.count_rows(&descriptor) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "count_rows failed, abandoning this reload");
            return Err(e);
        }
    };
    let hash_cap = 2 * row_count.max(1).next_power_of_two();
    snapshot.indexes = table
        .indexes
        .iter()
        .enumerate()
        .map(|(i, _)| HashIndex::build(hash_cap, seed_for(table.id, i as u8)))
        .collect();

    let first_int_slot = table.indexes.iter().position(|idx| idx.column_type == IndexColumnType::Int);

    let mut rows = 0usize;
    let mut min_id: Option<i64> = None;
    let mut max_id: Option<i64> = None;

    let result = adapter.iterate_rows(&descriptor, &mut |cols| {
        let payload = encode_row(cols, strip_null);
        let frame_offset = snapshot.arena.store_framed(&payload)?;
        let frame_len = 4 + payload.len() as u32;

        for (slot_idx, idx_def) in table.indexes.iter().enumerate() {
            if let Some(key) = extract_key(cols, idx_def) {
                let key_offset = snapshot.arena.store(&key)?;
                snapshot.indexes[slot_idx].insert(&key, key_offset, frame_offset, frame_len);
                if Some(slot_idx) == first_int_slot {
                    if let Some(id) = int_key_to_i64(&key) {
                        min_id = Some(min_id.map_or(id, |m| m.min(id)));
                        max_id = Some(max_id.map_or(id, |m| m.max(id)));
                    }
                }
            }
        }
        rows += 1;
        Ok(())
    });

    if let Err(e) = result {
        warn!(error = %e, "iterate_rows failed, abandoning this reload");
        return Err(e);
    }

    for index in snapshot.indexes.iter_mut() {
        index.finalize(&snapshot.arena);
    }

    table.publish(idle, TableStats { last_loaded_epoch: now_epoch, rows, min_id, max_id });
    info!(rows, "reload complete");
    Ok(true)
}

/// Deterministic per-index seed. The hash function only needs to be
/// reproducible within one snapshot's lifetime, not across processes.
fn seed_for(table_id: u8, index_id: u8) -> u64 {
    0x9E37_79B9_7F4A_7C15 ^ ((table_id as u64) << 8) ^ index_id as u64
}
