use std::sync::Arc;

use cache_table::Table;
use common::err::CacheError;
use db_adapter::IndexColumnType;
use db_adapter::IndexDescriptor;

use crate::config::{CacheConfig, TableConfig};

/// O(1) `table_id -> table` lookup array populated once at startup (§4.8).
pub struct TableRegistry {
    by_id: Vec<Option<Arc<Table>>>,
    tables: Vec<Arc<Table>>,
}

impl TableRegistry {
    pub fn build(config: &CacheConfig) -> Result<Self, CacheError> {
        let mut by_id: Vec<Option<Arc<Table>>> = vec![None; 256];
        let mut tables = Vec::with_capacity(config.tables.len());

        for table_cfg in &config.tables {
            let table = Arc::new(build_table(table_cfg, config.default_refresh_period_secs)?);
            let slot = &mut by_id[table_cfg.id as usize];
            if slot.is_some() {
                return Err(CacheError::Config(format!("duplicate table id {}", table_cfg.id)));
            }
            *slot = Some(table.clone());
            tables.push(table);
        }

        Ok(TableRegistry { by_id, tables })
    }

    pub fn lookup(&self, table_id: u8) -> Option<&Arc<Table>> {
        self.by_id[table_id as usize].as_ref()
    }

    pub fn all(&self) -> &[Arc<Table>] {
        &self.tables
    }

    /// Builds a registry directly from already-constructed tables, bypassing
    /// config parsing. Used by tests that need a table pre-loaded with rows
    /// before a connection is served against it.
    #[cfg(test)]
    pub(crate) fn for_tables(tables: Vec<Arc<Table>>) -> Self {
        let mut by_id: Vec<Option<Arc<Table>>> = vec![None; 256];
        for table in &tables {
            by_id[table.id as usize] = Some(table.clone());
        }
        TableRegistry { by_id, tables }
    }
}

fn build_table(cfg: &TableConfig, default_refresh_secs: u64) -> Result<Table, CacheError> {
    let indexes = cfg
        .indexes
        .iter()
        .map(|idx_cfg| {
            let column_type = parse_column_type(&idx_cfg.column_type)?;
            Ok(IndexDescriptor { id: idx_cfg.id, column_name: idx_cfg.column.clone(), column_type })
        })
        .collect::<Result<Vec<_>, CacheError>>()?;

    Ok(Table::new(cfg.id, cfg.name.clone(), cfg.refresh_period(default_refresh_secs), indexes))
}

fn parse_column_type(s: &str) -> Result<IndexColumnType, CacheError> {
    match s {
        "int" => Ok(IndexColumnType::Int),
        "string" => Ok(IndexColumnType::String),
        other => Err(CacheError::Config(format!("unknown index column type {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;

    fn config_with_one_table() -> CacheConfig {
        let mut cfg = CacheConfig::default();
        cfg.tables.push(TableConfig {
            id: 1,
            name: "widgets".into(),
            refresh_period_secs: None,
            indexes: vec![IndexConfig { id: 0, column: "id".into(), column_type: "int".into() }],
        });
        cfg
    }

    #[test]
    fn looks_up_configured_tables_by_id_and_rejects_unknown_ids() {
        let registry = TableRegistry::build(&config_with_one_table()).unwrap();
        assert!(registry.lookup(1).is_some());
        assert!(registry.lookup(2).is_none());
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn rejects_duplicate_table_ids() {
        let mut cfg = config_with_one_table();
        let dup = cfg.tables[0].clone();
        cfg.tables.push(dup);
        assert!(TableRegistry::build(&cfg).is_err());
    }

    #[test]
    fn rejects_unknown_index_column_type() {
        let mut cfg = config_with_one_table();
        cfg.tables[0].indexes[0].column_type = "float".into();
        assert!(TableRegistry::build(&cfg).is_err());
    }
}
