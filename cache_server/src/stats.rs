use serde_json::json;

use crate::registry::TableRegistry;

/// Live stats snapshot for the `s` action (§4.8, §6): arena usage, hash
/// index load, and probe counters for every table's current slot. Built
/// synchronously on the serving task; must stay well under the 10 KiB cap.
pub fn build_stats_json(registry: &TableRegistry) -> Vec<u8> {
    let tables: Vec<_> = registry
        .all()
        .iter()
        .map(|table| {
            let snapshot = table.current_snapshot();
            let table_stats = table.stats();
            let indexes: Vec<_> = snapshot
                .indexes
                .iter()
                .enumerate()
                .map(|(i, idx)| {
                    let probes = idx.stats();
                    json!({
                        "id": i,
                        "capacity": idx.capacity(),
                        "len": idx.len(),
                        "load_factor": idx.load_factor(),
                        "queries": probes.queries,
                        "probes": probes.probes,
                        "probe_overflows": probes.probe_overflows,
                    })
                })
                .collect();
            json!({
                "name": table.name,
                "id": table.id,
                "rows": table_stats.rows,
                "last_loaded_epoch": table_stats.last_loaded_epoch,
                "min_id": table_stats.min_id,
                "max_id": table_stats.max_id,
                "arena_used": snapshot.arena.used(),
                "arena_capacity": snapshot.arena.capacity(),
                "indexes": indexes,
            })
        })
        .collect();

    serde_json::to_vec(&json!({"event_loop_backend": "tokio-current-thread", "tables": tables}))
        .expect("stats json is always serializable")
}

#[cfg(test)]
mod tests {
    use db_adapter::MockAdapter;

    use super::*;
    use crate::config::{CacheConfig, IndexConfig, TableConfig};

    #[test]
    fn stats_json_reports_row_count_after_a_reload() {
        let mut config = CacheConfig::default();
        config.tables.push(TableConfig {
            id: 1,
            name: "widgets".into(),
            refresh_period_secs: Some(0),
            indexes: vec![IndexConfig { id: 0, column: "id".into(), column_type: "int".into() }],
        });
        let registry = TableRegistry::build(&config).unwrap();
        let table = registry.lookup(1).unwrap();

        let mut adapter =
            MockAdapter::new().with_rows("widgets", vec![vec![("id".to_string(), b"1".to_vec(), false)]]);
        cache_table::reload_table(table, &mut adapter, 1_700_000_000, true).unwrap();

        let json = build_stats_json(&registry);
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["tables"][0]["rows"], 1);
        assert!(json.len() < 10 * 1024);
    }
}
