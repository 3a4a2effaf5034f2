use chrono::Utc;
use duckdb::params;
use locol_core::attrs::{AttrValue, Attributes};
use locol_core::error::{LocolError, Result};
use locol_core::ids::new_id;
use locol_core::model::resource::{ResourceAttributeMapping, ResourceAttributeRow, ResourceRow};
use tracing::debug;

use crate::Store;

impl Store {
    /// Creates a resource and links it to its attributes, reusing any
    /// `(key, value)` row already present. Holds the write lock throughout so
    /// that concurrent resolutions cannot both insert the same pair.
    pub fn resolve_resource(
        &self,
        attributes: &Attributes,
        dropped_attributes_count: u32,
    ) -> Result<String> {
        let guard = self.write_lock();
        let now = Utc::now();
        let resource_id = new_id();

        self.append_resource(
            &guard,
            &ResourceRow {
                resource_id: resource_id.clone(),
                timestamp: now,
                dropped_attributes_count,
            },
        )?;

        let mut reused = 0usize;
        for attr in attributes.canonicalize().iter() {
            let value = attr.value.canonical_text();
            let attribute_id = match self.find_attribute(&attr.key, &value)? {
                Some(id) => {
                    reused += 1;
                    id
                }
                None => {
                    let id = new_id();
                    self.append_resource_attribute(
                        &guard,
                        &ResourceAttributeRow {
                            attribute_id: id.clone(),
                            key: attr.key.clone(),
                            value,
                            timestamp: now,
                        },
                    )?;
                    id
                }
            };
            self.append_mapping(
                &guard,
                &ResourceAttributeMapping {
                    resource_id: resource_id.clone(),
                    attribute_id,
                },
            )?;
        }

        debug!(%resource_id, attributes = attributes.len(), reused, "resolved resource");
        Ok(resource_id)
    }

    pub fn find_attribute(&self, key: &str, value: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT attribute_id FROM resource_attributes WHERE key = ? AND value = ?")
                .map_err(|e| LocolError::Store(format!("prepare attribute lookup failed: {e}")))?;
            let mut rows = stmt
                .query(params![key, value])
                .map_err(|e| LocolError::Store(format!("attribute lookup failed: {e}")))?;
            match rows
                .next()
                .map_err(|e| LocolError::Store(format!("attribute lookup failed: {e}")))?
            {
                Some(row) => row
                    .get::<_, String>(0)
                    .map(Some)
                    .map_err(|e| LocolError::Store(format!("map attribute row failed: {e}"))),
                None => Ok(None),
            }
        })
    }

    /// Attributes linked to one resource, ordered by key. Every value comes back as
    /// `AttrValue::String` holding the canonical text it was deduplicated on.
    pub fn resource_attributes(&self, resource_id: &str) -> Result<Attributes> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT a.key, a.value
                     FROM resource_attribute_mappings m
                     JOIN resource_attributes a ON a.attribute_id = m.attribute_id
                     WHERE m.resource_id = ?
                     ORDER BY a.key ASC",
                )
                .map_err(|e| {
                    LocolError::Store(format!("prepare resource attributes failed: {e}"))
                })?;
            let rows = stmt
                .query_map(params![resource_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| LocolError::Store(format!("query resource attributes failed: {e}")))?;

            let mut attrs = Attributes::new();
            for row in rows {
                let (key, value) = row
                    .map_err(|e| LocolError::Store(format!("map resource attribute failed: {e}")))?;
                attrs.push(key, AttrValue::String(value));
            }
            Ok(attrs)
        })
    }
}
