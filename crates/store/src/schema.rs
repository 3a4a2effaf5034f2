use std::fmt;
use std::str::FromStr;

use locol_core::error::{LocolError, Result};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS resource_attributes (
  attribute_id TEXT PRIMARY KEY,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  "timestamp" TIMESTAMP NOT NULL,
  UNIQUE(key, value)
);

CREATE TABLE IF NOT EXISTS resource_attribute_mappings (
  resource_id TEXT NOT NULL,
  attribute_id TEXT NOT NULL,
  PRIMARY KEY(resource_id, attribute_id)
);

CREATE TABLE IF NOT EXISTS resources (
  resource_id TEXT PRIMARY KEY,
  "timestamp" TIMESTAMP NOT NULL,
  dropped_attributes_count UINTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS instrumentation_scopes (
  scope_id TEXT PRIMARY KEY,
  resource_id TEXT NOT NULL,
  name TEXT NOT NULL,
  version TEXT NOT NULL,
  attributes TEXT NOT NULL,
  dropped_attributes_count UINTEGER NOT NULL,
  "timestamp" TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS spans (
  trace_id TEXT NOT NULL,
  span_id TEXT NOT NULL,
  parent_span_id TEXT,
  resource_id TEXT NOT NULL,
  scope_id TEXT NOT NULL,
  name TEXT NOT NULL,
  kind INTEGER NOT NULL,
  attributes TEXT NOT NULL,
  start_time TIMESTAMP NOT NULL,
  end_time TIMESTAMP NOT NULL,
  PRIMARY KEY(trace_id, span_id)
);

CREATE TABLE IF NOT EXISTS metric_points (
  metric_point_id TEXT PRIMARY KEY,
  resource_id TEXT NOT NULL,
  scope_id TEXT NOT NULL,
  metric_name TEXT NOT NULL,
  description TEXT NOT NULL,
  unit TEXT NOT NULL,
  "type" TEXT NOT NULL,
  value DOUBLE NOT NULL,
  attributes TEXT NOT NULL,
  "time" TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS log_records (
  log_id TEXT PRIMARY KEY,
  resource_id TEXT NOT NULL,
  scope_id TEXT NOT NULL,
  severity_text TEXT NOT NULL,
  severity_number INTEGER NOT NULL,
  body TEXT NOT NULL,
  attributes TEXT NOT NULL,
  "timestamp" TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_resource_attributes_key ON resource_attributes(key);
CREATE INDEX IF NOT EXISTS idx_resource_attributes_value ON resource_attributes(value);

CREATE INDEX IF NOT EXISTS idx_mappings_resource ON resource_attribute_mappings(resource_id);
CREATE INDEX IF NOT EXISTS idx_mappings_attribute ON resource_attribute_mappings(attribute_id);

CREATE INDEX IF NOT EXISTS idx_spans_resource ON spans(resource_id);
CREATE INDEX IF NOT EXISTS idx_spans_start ON spans(start_time);
CREATE INDEX IF NOT EXISTS idx_spans_end ON spans(end_time);

CREATE INDEX IF NOT EXISTS idx_metric_points_resource ON metric_points(resource_id);
CREATE INDEX IF NOT EXISTS idx_metric_points_time ON metric_points("time");

CREATE INDEX IF NOT EXISTS idx_log_records_resource ON log_records(resource_id);
CREATE INDEX IF NOT EXISTS idx_log_records_timestamp ON log_records("timestamp");
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Resources,
    ResourceAttributes,
    ResourceAttributeMappings,
    InstrumentationScopes,
    Spans,
    MetricPoints,
    LogRecords,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Resources,
        Table::ResourceAttributes,
        Table::ResourceAttributeMappings,
        Table::InstrumentationScopes,
        Table::Spans,
        Table::MetricPoints,
        Table::LogRecords,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Resources => "resources",
            Table::ResourceAttributes => "resource_attributes",
            Table::ResourceAttributeMappings => "resource_attribute_mappings",
            Table::InstrumentationScopes => "instrumentation_scopes",
            Table::Spans => "spans",
            Table::MetricPoints => "metric_points",
            Table::LogRecords => "log_records",
        }
    }

    /// Number of values one appended row must carry.
    pub fn column_count(self) -> usize {
        match self {
            Table::Resources => 3,
            Table::ResourceAttributes => 4,
            Table::ResourceAttributeMappings => 2,
            Table::InstrumentationScopes => 7,
            Table::Spans => 10,
            Table::MetricPoints => 10,
            Table::LogRecords => 8,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = LocolError;

    fn from_str(s: &str) -> Result<Self> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| LocolError::AppenderInitFailed(format!("unknown table: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_parse_back() {
        for table in Table::ALL {
            assert_eq!(table.name().parse::<Table>().unwrap(), table);
        }
    }

    #[test]
    fn unknown_table_is_appender_init_failure() {
        let err = "sessions".parse::<Table>().unwrap_err();
        assert!(matches!(err, LocolError::AppenderInitFailed(ref m) if m.contains("sessions")));
    }
}
