use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRow {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub resource_id: String,
    pub scope_id: String,
    pub name: String,
    pub kind: i32,
    pub attributes: Attributes,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl SpanRow {
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds().max(0)
    }
}
