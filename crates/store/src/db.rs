use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use duckdb::Connection;
use locol_core::error::{LocolError, Result};
use locol_core::query::StatusResponse;
use tracing::{info, warn};

use crate::append::AppendChannel;
use crate::schema::{SCHEMA_SQL, Table};

pub const DEFAULT_DB_THREADS: usize = 4;

/// Handle to one in-memory DuckDB session. Clones share the connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Option<Connection>>>,
    pub(crate) appenders: Arc<Mutex<HashMap<Table, Arc<AppendChannel>>>>,
    pub(crate) writer: Arc<Mutex<()>>,
    threads: usize,
}

impl Store {
    /// A store that is not connected yet; call [`Store::connect`] before use.
    pub fn new(threads: usize) -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            appenders: Arc::new(Mutex::new(HashMap::new())),
            writer: Arc::new(Mutex::new(())),
            threads: threads.max(1),
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self::new(DEFAULT_DB_THREADS);
        store.connect()?;
        Ok(store)
    }

    pub fn connect(&self) -> Result<()> {
        let mut slot = self.conn.lock().expect("store mutex poisoned");
        if slot.is_some() {
            return Ok(());
        }

        let conn = Connection::open_in_memory().map_err(|e| {
            LocolError::ConnectionFailed(format!("failed to open in-memory db: {e}"))
        })?;
        conn.execute_batch(&format!("PRAGMA threads={};", self.threads))
            .map_err(|e| LocolError::ConnectionFailed(format!("failed to set pragmas: {e}")))?;
        conn.execute_batch(SCHEMA_SQL).map_err(|e| {
            LocolError::ConnectionFailed(format!("failed to initialize schema: {e}"))
        })?;

        *slot = Some(conn);
        info!(threads = self.threads, "store connected");
        Ok(())
    }

    pub fn disconnect(&self) {
        let _writer = self.writer.lock().expect("store mutex poisoned");
        if !self.is_connected() {
            return;
        }
        if let Err(err) = self.flush_pending() {
            warn!(error = %err, "flush on disconnect failed; pending rows dropped");
        }
        self.appenders.lock().expect("store mutex poisoned").clear();
        self.conn.lock().expect("store mutex poisoned").take();
        info!("store disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().expect("store mutex poisoned").is_some()
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().expect("store mutex poisoned");
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(not_connected()),
        }
    }

    pub(crate) fn write_lock(&self) -> WriteGuard<'_> {
        WriteGuard {
            _guard: self.writer.lock().expect("store mutex poisoned"),
        }
    }

    pub fn status(&self) -> Result<StatusResponse> {
        if !self.is_connected() {
            return Ok(StatusResponse {
                connected: false,
                resources_count: 0,
                attributes_count: 0,
                scopes_count: 0,
                spans_count: 0,
                metrics_count: 0,
                logs_count: 0,
            });
        }

        self.with_conn(|conn| {
            Ok(StatusResponse {
                connected: true,
                resources_count: count_rows(conn, Table::Resources)?,
                attributes_count: count_rows(conn, Table::ResourceAttributes)?,
                scopes_count: count_rows(conn, Table::InstrumentationScopes)?,
                spans_count: count_rows(conn, Table::Spans)?,
                metrics_count: count_rows(conn, Table::MetricPoints)?,
                logs_count: count_rows(conn, Table::LogRecords)?,
            })
        })
    }
}

/// Proof that the caller holds the store's single write lock.
pub(crate) struct WriteGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

pub(crate) fn not_connected() -> LocolError {
    LocolError::ConnectionFailed("store is not connected".to_string())
}

fn count_rows(conn: &Connection, table: Table) -> Result<usize> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|v| v as usize)
    .map_err(|e| LocolError::Store(format!("count {table} failed: {e}")))
}
