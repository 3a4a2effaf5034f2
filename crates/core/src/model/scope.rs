use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeRow {
    pub scope_id: String,
    pub resource_id: String,
    pub name: String,
    pub version: String,
    pub attributes: Attributes,
    pub dropped_attributes_count: u32,
    pub timestamp: DateTime<Utc>,
}
