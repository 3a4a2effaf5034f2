use std::sync::{Arc, Mutex};

use duckdb::types::Value;
use locol_core::error::{LocolError, Result};
use tracing::warn;

use crate::db::{Store, WriteGuard};
use crate::schema::Table;

/// Per-table append handle. Rows are buffered until the store flushes them.
#[derive(Debug)]
pub struct AppendChannel {
    table: Table,
    pending: Mutex<Vec<Vec<Value>>>,
}

impl AppendChannel {
    fn new(table: Table) -> Self {
        Self {
            table,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Commits one row to the buffer. It becomes queryable on the next flush.
    pub fn append_row(&self, row: Vec<Value>) -> Result<()> {
        self.append_rows(vec![row])
    }

    /// Buffers every row or none of them.
    pub fn append_rows(&self, rows: Vec<Vec<Value>>) -> Result<()> {
        let expected = self.table.column_count();
        if let Some(bad) = rows.iter().find(|row| row.len() != expected) {
            return Err(LocolError::Store(format!(
                "{} expects {expected} values per row, got {}",
                self.table,
                bad.len()
            )));
        }
        self.pending
            .lock()
            .expect("store mutex poisoned")
            .extend(rows);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().expect("store mutex poisoned").len()
    }

    fn take_pending(&self) -> Vec<Vec<Value>> {
        std::mem::take(&mut *self.pending.lock().expect("store mutex poisoned"))
    }
}

impl Store {
    pub fn create_appender(&self, table: &str) -> Result<Arc<AppendChannel>> {
        self.appender(table.parse()?)
    }

    pub fn appender(&self, table: Table) -> Result<Arc<AppendChannel>> {
        if !self.is_connected() {
            return Err(crate::db::not_connected());
        }
        let mut appenders = self.appenders.lock().expect("store mutex poisoned");
        Ok(appenders
            .entry(table)
            .or_insert_with(|| Arc::new(AppendChannel::new(table)))
            .clone())
    }

    pub fn flush_appenders(&self) -> Result<()> {
        let _writer = self.write_lock();
        self.flush_pending()
    }

    /// Commits one row and flushes it.
    pub fn append(&self, table: Table, row: Vec<Value>) -> Result<()> {
        let guard = self.write_lock();
        self.append_with(&guard, table, row)
    }

    pub(crate) fn append_with(
        &self,
        guard: &WriteGuard<'_>,
        table: Table,
        row: Vec<Value>,
    ) -> Result<()> {
        self.append_all_with(guard, table, vec![row])
    }

    /// Commits a group of rows in one flush. A failed flush keeps none of them.
    pub(crate) fn append_all_with(
        &self,
        _guard: &WriteGuard<'_>,
        table: Table,
        rows: Vec<Vec<Value>>,
    ) -> Result<()> {
        self.appender(table)?.append_rows(rows)?;
        self.flush_pending()
    }

    /// Caller must hold the write lock.
    pub(crate) fn flush_pending(&self) -> Result<()> {
        let mut channels = self
            .appenders
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect::<Vec<_>>();
        channels.sort_by_key(|c| c.table());

        self.with_conn(|conn| {
            let mut first_err = None;
            for channel in channels {
                let rows = channel.take_pending();
                if rows.is_empty() {
                    continue;
                }
                if let Err(err) = write_rows(conn, channel.table(), &rows) {
                    warn!(
                        table = %channel.table(),
                        rows = rows.len(),
                        error = %err,
                        "flush failed; rows discarded"
                    );
                    first_err.get_or_insert(err);
                }
            }
            first_err.map_or(Ok(()), Err)
        })
    }
}

fn write_rows(conn: &duckdb::Connection, table: Table, rows: &[Vec<Value>]) -> Result<()> {
    // Dropping the transaction on an early return rolls back rows already appended.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| LocolError::Store(format!("begin tx for {table} failed: {e}")))?;
    {
        let mut appender = tx
            .appender(table.name())
            .map_err(|e| LocolError::AppenderInitFailed(format!("{table}: {e}")))?;
        for row in rows {
            appender
                .append_row(duckdb::appender_params_from_iter(row.iter()))
                .map_err(|e| LocolError::Store(format!("append to {table} failed: {e}")))?;
        }
        appender
            .flush()
            .map_err(|e| LocolError::Store(format!("flush {table} failed: {e}")))?;
    }
    tx.commit()
        .map_err(|e| LocolError::Store(format!("commit {table} failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(store: &Store, table: Table) -> i64 {
        store
            .with_conn(|conn| {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(|e| LocolError::Store(e.to_string()))
            })
            .unwrap()
    }

    fn mapping(resource: &str, attribute: &str) -> Vec<Value> {
        vec![
            Value::Text(resource.to_string()),
            Value::Text(attribute.to_string()),
        ]
    }

    #[test]
    fn appender_is_cached_per_table() {
        let store = Store::open_in_memory().unwrap();
        let a = store.create_appender("spans").unwrap();
        let b = store.create_appender("spans").unwrap();
        let c = store.create_appender("log_records").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn unknown_table_fails_appender_init() {
        let store = Store::open_in_memory().unwrap();
        let err = store.create_appender("sessions").unwrap_err();
        assert!(matches!(err, LocolError::AppenderInitFailed(_)));
    }

    #[test]
    fn rows_are_visible_only_after_flush() {
        let store = Store::open_in_memory().unwrap();
        let channel = store.create_appender("resource_attribute_mappings").unwrap();
        channel.append_row(mapping("r1", "a1")).unwrap();
        assert_eq!(channel.pending(), 1);
        assert_eq!(count(&store, Table::ResourceAttributeMappings), 0);

        store.flush_appenders().unwrap();
        assert_eq!(channel.pending(), 0);
        assert_eq!(count(&store, Table::ResourceAttributeMappings), 1);
    }

    #[test]
    fn flush_twice_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store
            .append(Table::ResourceAttributeMappings, mapping("r1", "a1"))
            .unwrap();
        store.flush_appenders().unwrap();
        store.flush_appenders().unwrap();
        assert_eq!(count(&store, Table::ResourceAttributeMappings), 1);
    }

    #[test]
    fn row_width_is_checked() {
        let store = Store::open_in_memory().unwrap();
        let err = store
            .append(Table::Resources, vec![Value::Text("r1".into())])
            .unwrap_err();
        assert!(matches!(err, LocolError::Store(_)));
    }

    #[test]
    fn failed_flush_discards_rows() {
        let store = Store::open_in_memory().unwrap();
        store
            .append(Table::ResourceAttributeMappings, mapping("r1", "a1"))
            .unwrap();
        assert!(
            store
                .append(Table::ResourceAttributeMappings, mapping("r1", "a1"))
                .is_err()
        );
        assert_eq!(store.appender(Table::ResourceAttributeMappings).unwrap().pending(), 0);

        store
            .append(Table::ResourceAttributeMappings, mapping("r1", "a2"))
            .unwrap();
        assert_eq!(count(&store, Table::ResourceAttributeMappings), 2);
    }

    #[test]
    fn grouped_rows_commit_together_or_not_at_all() {
        let store = Store::open_in_memory().unwrap();
        let guard = store.write_lock();
        let err = store
            .append_all_with(
                &guard,
                Table::ResourceAttributeMappings,
                vec![mapping("r1", "a1"), mapping("r1", "a2"), mapping("r1", "a1")],
            )
            .unwrap_err();
        assert!(matches!(err, LocolError::Store(_)));
        assert_eq!(count(&store, Table::ResourceAttributeMappings), 0);

        let err = store
            .append_all_with(
                &guard,
                Table::ResourceAttributeMappings,
                vec![mapping("r1", "a1"), vec![Value::Text("r1".into())]],
            )
            .unwrap_err();
        assert!(matches!(err, LocolError::Store(_)));
        assert_eq!(store.appender(Table::ResourceAttributeMappings).unwrap().pending(), 0);

        store
            .append_all_with(
                &guard,
                Table::ResourceAttributeMappings,
                vec![mapping("r1", "a1"), mapping("r1", "a2")],
            )
            .unwrap();
        assert_eq!(count(&store, Table::ResourceAttributeMappings), 2);
    }

    #[test]
    fn disconnected_store_rejects_appenders() {
        let store = Store::new(1);
        let err = store.create_appender("spans").unwrap_err();
        assert!(matches!(err, LocolError::ConnectionFailed(_)));
    }
}
