pub mod encode;
pub mod loader;
pub mod scheduler;
pub mod snapshot;
pub mod table;

pub use loader::reload_table;
pub use scheduler::{now_epoch, ReloadScheduler, SchedulerMessage};
pub use snapshot::Snapshot;
pub use table::{Table, TableStats};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use db_adapter::{IndexColumnType, IndexDescriptor, MockAdapter};

    use super::*;

    fn sample_table() -> Table {
        Table::new(
            1,
            "widgets".to_string(),
            Duration::from_secs(0),
            vec![IndexDescriptor { id: 0, column_name: "id".into(), column_type: IndexColumnType::Int }],
        )
    }

    fn rows(n: i32) -> Vec<Vec<(String, Vec<u8>, bool)>> {
        (1..=n)
            .map(|i| {
                vec![
                    ("id".to_string(), i.to_string().into_bytes(), false),
                    ("name".to_string(), format!("item-{i}").into_bytes(), false),
                ]
            })
            .collect()
    }

    #[test]
    fn reload_publishes_a_queryable_snapshot() {
        let table = sample_table();
        let mut adapter = MockAdapter::new().with_rows("widgets", rows(5));

        let reloaded = loader::reload_table(&table, &mut adapter, 100, true).unwrap();
        assert!(reloaded);

        let snapshot = table.current_snapshot();
        let hit = snapshot.indexes[0].lookup(&3i32.to_le_bytes()).expect("id=3 should hit");
        let frame = unsafe { std::slice::from_raw_parts(hit.frame_ptr, hit.frame_len as usize) };
        assert_eq!(&frame[4..], br#"{"id":3,"name":"item-3"}"#);

        let stats = table.stats();
        assert_eq!(stats.rows, 5);
        assert_eq!(stats.min_id, Some(1));
        assert_eq!(stats.max_id, Some(5));
    }

    #[test]
    fn tracks_min_max_on_the_first_integer_index_even_when_it_is_not_slot_zero() {
        let table = Table::new(
            1,
            "widgets".to_string(),
            Duration::from_secs(0),
            vec![
                IndexDescriptor { id: 0, column_name: "sku".into(), column_type: IndexColumnType::String },
                IndexDescriptor { id: 1, column_name: "id".into(), column_type: IndexColumnType::Int },
            ],
        );
        let data = (1..=5)
            .map(|i| {
                vec![
                    ("sku".to_string(), format!("SKU{i}").into_bytes(), false),
                    ("id".to_string(), i.to_string().into_bytes(), false),
                ]
            })
            .collect();
        let mut adapter = MockAdapter::new().with_rows("widgets", data);

        assert!(loader::reload_table(&table, &mut adapter, 100, true).unwrap());

        let stats = table.stats();
        assert_eq!(stats.min_id, Some(1));
        assert_eq!(stats.max_id, Some(5));
    }

    #[test]
    fn skips_reload_before_refresh_period_elapses() {
        let table = Table::new(
            1,
            "widgets".into(),
            Duration::from_secs(3600),
            vec![IndexDescriptor { id: 0, column_name: "id".into(), column_type: IndexColumnType::Int }],
        );
        let mut adapter = MockAdapter::new().with_rows("widgets", rows(1));
        let first = 1_700_000_000u64;
        assert!(loader::reload_table(&table, &mut adapter, first, true).unwrap());
        assert!(!loader::reload_table(&table, &mut adapter, first + 1, true).unwrap());
    }

    #[test]
    fn scheduler_reload_is_visible_to_readers() {
        let table = Arc::new(sample_table());
        let adapter = Box::new(MockAdapter::new().with_rows("widgets", rows(2)));
        let (handle, tx) = ReloadScheduler::spawn(vec![table.clone()], adapter, Duration::from_millis(20), true);
        tx.send(SchedulerMessage::Poke).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        tx.send(SchedulerMessage::Stop).unwrap();
        handle.join().unwrap();
        assert_eq!(table.stats().rows, 2);
    }
}
