use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRow {
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    pub dropped_attributes_count: u32,
}

/// One distinct `(key, value)` pair, shared by every resource presenting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceAttributeRow {
    pub attribute_id: String,
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceAttributeMapping {
    pub resource_id: String,
    pub attribute_id: String,
}
