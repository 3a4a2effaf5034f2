use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRow {
    pub log_id: String,
    pub resource_id: String,
    pub scope_id: String,
    pub severity_text: String,
    pub severity_number: i32,
    pub body: String,
    pub attributes: Attributes,
    pub timestamp: DateTime<Utc>,
}
