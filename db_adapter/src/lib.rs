//! The database adapter contract (§6, §4.13): the loader's only external
//! collaborator. Real MySQL/SQLite/PostgreSQL wire plumbing lives outside
//! this crate — callers provide their own [`DbAdapter`] impl; [`MockAdapter`]
//! stands in for it in tests and when running the server without a real
//! database.

use std::collections::HashMap;

use common::CResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexColumnType {
    Int,
    String,
}

#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    pub id: u8,
    pub column_name: String,
    pub column_type: IndexColumnType,
}

#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub id: u8,
    pub name: String,
    pub indexes: Vec<IndexDescriptor>,
}

/// One column value as handed to the loader by `iterate_rows`: the column
/// name, its raw bytes, and whether the value was SQL NULL.
pub type ColumnValue<'a> = (&'a str, &'a [u8], bool);

/// External collaborator: turns a configured table into a row count and a
/// stream of rows. Calls are synchronous — the reload scheduler runs them on
/// its own background thread so they never stall the serving loop.
pub trait DbAdapter: Send {
    fn connect(&mut self) -> CResult<()>;
    fn disconnect(&mut self) -> CResult<()>;
    fn count_rows(&mut self, table: &TableDescriptor) -> CResult<usize>;

    /// Streams every row of `table`, calling `emit` once per row with that
    /// row's columns. The loader is responsible for turning a row into the
    /// wire payload and for extracting index key columns as bytes typed per
    /// `IndexDescriptor::column_type`.
    fn iterate_rows(
        &mut self,
        table: &TableDescriptor,
        emit: &mut dyn FnMut(&[ColumnValue]) -> CResult<()>,
    ) -> CResult<()>;
}

/// One pre-encoded column in a [`MockAdapter`] row: `(column_name,
/// value_bytes, is_null)`.
pub type MockColumn = (String, Vec<u8>, bool);

/// An in-memory stand-in for a real database, keyed by table name. Rows are
/// pre-encoded by the test or example that constructs the adapter.
#[derive(Debug, Default)]
pub struct MockAdapter {
    connected: bool,
    tables: HashMap<String, Vec<Vec<MockColumn>>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, table_name: &str, rows: Vec<Vec<MockColumn>>) -> Self {
        self.tables.insert(table_name.to_string(), rows);
        self
    }

    pub fn set_rows(&mut self, table_name: &str, rows: Vec<Vec<MockColumn>>) {
        self.tables.insert(table_name.to_string(), rows);
    }
}

impl DbAdapter for MockAdapter {
    fn connect(&mut self) -> CResult<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> CResult<()> {
        self.connected = false;
        Ok(())
    }

    fn count_rows(&mut self, table: &TableDescriptor) -> CResult<usize> {
        Ok(self.tables.get(&table.name).map(|rows| rows.len()).unwrap_or(0))
    }

    fn iterate_rows(
        &mut self,
        table: &TableDescriptor,
        emit: &mut dyn FnMut(&[ColumnValue]) -> CResult<()>,
    ) -> CResult<()> {
        if let Some(rows) = self.tables.get(&table.name) {
            for row in rows {
                let cols: Vec<ColumnValue> =
                    row.iter().map(|(n, v, null)| (n.as_str(), v.as_slice(), *null)).collect();
                emit(&cols)?;
            }
        }
        Ok(())
    }
}
