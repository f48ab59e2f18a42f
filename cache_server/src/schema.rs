use serde_json::json;

use crate::config::CacheConfig;

/// Computed once at startup from the configured table list (§4.8, §6);
/// cached and returned verbatim on every `D` (describe) request.
pub fn build_schema_json(config: &CacheConfig) -> Vec<u8> {
    let tables: Vec<_> = config
        .tables
        .iter()
        .map(|t| {
            let indexes: Vec<_> = t
                .indexes
                .iter()
                .map(|i| json!({"id": i.id, "column": i.column, "type": i.column_type}))
                .collect();
            json!({
                "name": t.name,
                "id": t.id,
                "period": t.refresh_period_secs.unwrap_or(config.default_refresh_period_secs),
                "indexes": indexes,
            })
        })
        .collect();

    serde_json::to_vec(&json!({"tables": tables})).expect("schema json is always serializable")
}
