use chrono::NaiveDateTime;
use duckdb::params;
use duckdb::params_from_iter;
use duckdb::types::{Type, Value};
use locol_core::attrs::Attributes;
use locol_core::error::{LocolError, Result};
use locol_core::filter::TimeWindow;
use locol_core::model::log::LogRow;
use locol_core::model::metric::{MetricPointRow, MetricType};
use locol_core::model::span::SpanRow;
use locol_core::query::{Column, ColumnValues, ColumnarResult, ResourceAttributeGroup};
use locol_core::time::naive_to_utc;

use crate::Store;
use crate::columnar::{column_type_of, push_value};
use crate::write::timestamp;

impl Store {
    /// Runs caller-supplied SQL verbatim. Either every column is returned in
    /// full or the call fails with `QueryFailed`.
    pub fn execute_query(&self, sql: &str) -> Result<ColumnarResult> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| LocolError::QueryFailed(e.to_string()))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| LocolError::QueryFailed(e.to_string()))?;

            let mut columns = {
                let executed = rows.as_ref().ok_or_else(|| {
                    LocolError::QueryFailed("statement produced no result".to_string())
                })?;
                executed
                    .column_names()
                    .into_iter()
                    .enumerate()
                    .map(|(i, name)| Column {
                        name,
                        values: ColumnValues::empty(column_type_of(&Type::from(
                            &executed.column_type(i),
                        ))),
                    })
                    .collect::<Vec<_>>()
            };

            while let Some(row) = rows
                .next()
                .map_err(|e| LocolError::QueryFailed(e.to_string()))?
            {
                for (i, column) in columns.iter_mut().enumerate() {
                    let value = row
                        .get::<_, Value>(i)
                        .map_err(|e| LocolError::QueryFailed(e.to_string()))?;
                    push_value(&mut column.values, value);
                }
            }

            ColumnarResult::new(columns)
        })
    }

    /// One group per linked `(key, value)` pair. Pairs keyed by `primary_key`
    /// come first; each tier is ordered by value, then key.
    pub fn resource_groups(&self, primary_key: &str) -> Result<Vec<ResourceAttributeGroup>> {
        let pairs = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"SELECT a.key, a.value, m.resource_id
                       FROM resource_attributes a
                       JOIN resource_attribute_mappings m ON m.attribute_id = a.attribute_id
                       JOIN resources r ON r.resource_id = m.resource_id
                       ORDER BY CASE WHEN a.key = ? THEN 0 ELSE 1 END,
                                a.value ASC, a.key ASC, r."timestamp" ASC, r.resource_id ASC"#,
                )
                .map_err(|e| LocolError::Store(format!("prepare resource groups failed: {e}")))?;
            let rows = stmt
                .query_map(params![primary_key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|e| LocolError::Store(format!("query resource groups failed: {e}")))?;

            let mut out = Vec::new();
            for row in rows {
                out.push(
                    row.map_err(|e| LocolError::Store(format!("map resource group failed: {e}")))?,
                );
            }
            Ok(out)
        })?;

        let mut groups: Vec<ResourceAttributeGroup> = Vec::new();
        for (key, value, resource_id) in pairs {
            match groups.last_mut() {
                Some(last) if last.key == key && last.value == value => {
                    last.resource_ids.push(resource_id)
                }
                _ => groups.push(ResourceAttributeGroup {
                    key,
                    value,
                    resource_ids: vec![resource_id],
                }),
            }
        }
        Ok(groups)
    }

    pub fn resource_ids(&self, key: &str, value: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"SELECT m.resource_id
                       FROM resource_attribute_mappings m
                       JOIN resource_attributes a ON a.attribute_id = m.attribute_id
                       JOIN resources r ON r.resource_id = m.resource_id
                       WHERE a.key = ? AND a.value = ?
                       ORDER BY r."timestamp" ASC, r.resource_id ASC"#,
                )
                .map_err(|e| LocolError::Store(format!("prepare resource ids failed: {e}")))?;
            let rows = stmt
                .query_map(params![key, value], |row| row.get::<_, String>(0))
                .map_err(|e| LocolError::Store(format!("query resource ids failed: {e}")))?;

            let mut ids = Vec::new();
            for row in rows {
                ids.push(
                    row.map_err(|e| LocolError::Store(format!("map resource id failed: {e}")))?,
                );
            }
            Ok(ids)
        })
    }

    pub fn spans_for_resources(&self, resource_ids: &[String]) -> Result<Vec<SpanRow>> {
        self.spans_for_resources_in(resource_ids, &TimeWindow::all())
    }

    pub fn spans_for_resources_in(
        &self,
        resource_ids: &[String],
        window: &TimeWindow,
    ) -> Result<Vec<SpanRow>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (where_sql, args) = resource_filter(resource_ids, window, "start_time");
        let sql = format!(
            "SELECT trace_id, span_id, parent_span_id, resource_id, scope_id, name, kind,
                    attributes, start_time, end_time
             FROM spans
             {where_sql}
             ORDER BY start_time ASC, trace_id ASC, span_id ASC"
        );

        let raw = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| LocolError::Store(format!("prepare spans failed: {e}")))?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), |row| {
                    Ok((
                        row.get::<_, String>(7)?,
                        SpanRow {
                            trace_id: row.get::<_, String>(0)?,
                            span_id: row.get::<_, String>(1)?,
                            parent_span_id: row.get::<_, Option<String>>(2)?,
                            resource_id: row.get::<_, String>(3)?,
                            scope_id: row.get::<_, String>(4)?,
                            name: row.get::<_, String>(5)?,
                            kind: row.get::<_, i32>(6)?,
                            attributes: Attributes::new(),
                            start_time: naive_to_utc(row.get::<_, NaiveDateTime>(8)?),
                            end_time: naive_to_utc(row.get::<_, NaiveDateTime>(9)?),
                        },
                    ))
                })
                .map_err(|e| LocolError::Store(format!("query spans failed: {e}")))?;
            collect_rows(rows, "span")
        })?;

        with_attributes(raw, |span, attrs| span.attributes = attrs)
    }

    pub fn metrics_for_resources(&self, resource_ids: &[String]) -> Result<Vec<MetricPointRow>> {
        self.metrics_for_resources_in(resource_ids, &TimeWindow::all())
    }

    pub fn metrics_for_resources_in(
        &self,
        resource_ids: &[String],
        window: &TimeWindow,
    ) -> Result<Vec<MetricPointRow>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (where_sql, args) = resource_filter(resource_ids, window, r#""time""#);
        let sql = format!(
            r#"SELECT metric_point_id, resource_id, scope_id, metric_name, description, unit,
                      "type", value, attributes, "time"
               FROM metric_points
               {where_sql}
               ORDER BY "time" ASC, metric_name ASC"#
        );

        let raw = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| LocolError::Store(format!("prepare metrics failed: {e}")))?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), |row| {
                    Ok((
                        row.get::<_, String>(8)?,
                        (
                            row.get::<_, String>(6)?,
                            MetricPointRow {
                                metric_point_id: row.get::<_, String>(0)?,
                                resource_id: row.get::<_, String>(1)?,
                                scope_id: row.get::<_, String>(2)?,
                                metric_name: row.get::<_, String>(3)?,
                                description: row.get::<_, String>(4)?,
                                unit: row.get::<_, String>(5)?,
                                metric_type: MetricType::Unknown,
                                value: row.get::<_, f64>(7)?,
                                attributes: Attributes::new(),
                                time: naive_to_utc(row.get::<_, NaiveDateTime>(9)?),
                            },
                        ),
                    ))
                })
                .map_err(|e| LocolError::Store(format!("query metrics failed: {e}")))?;
            collect_rows(rows, "metric point")
        })?;

        let typed = raw
            .into_iter()
            .map(|(attrs, (ty, mut point))| {
                point.metric_type = ty.parse()?;
                Ok((attrs, point))
            })
            .collect::<Result<Vec<_>>>()?;
        with_attributes(typed, |point, attrs| point.attributes = attrs)
    }

    pub fn logs_for_resources(&self, resource_ids: &[String]) -> Result<Vec<LogRow>> {
        self.logs_for_resources_in(resource_ids, &TimeWindow::all())
    }

    pub fn logs_for_resources_in(
        &self,
        resource_ids: &[String],
        window: &TimeWindow,
    ) -> Result<Vec<LogRow>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (where_sql, args) = resource_filter(resource_ids, window, r#""timestamp""#);
        let sql = format!(
            r#"SELECT log_id, resource_id, scope_id, severity_text, severity_number, body,
                      attributes, "timestamp"
               FROM log_records
               {where_sql}
               ORDER BY "timestamp" ASC, log_id ASC"#
        );

        let raw = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| LocolError::Store(format!("prepare logs failed: {e}")))?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), |row| {
                    Ok((
                        row.get::<_, String>(6)?,
                        LogRow {
                            log_id: row.get::<_, String>(0)?,
                            resource_id: row.get::<_, String>(1)?,
                            scope_id: row.get::<_, String>(2)?,
                            severity_text: row.get::<_, String>(3)?,
                            severity_number: row.get::<_, i32>(4)?,
                            body: row.get::<_, String>(5)?,
                            attributes: Attributes::new(),
                            timestamp: naive_to_utc(row.get::<_, NaiveDateTime>(7)?),
                        },
                    ))
                })
                .map_err(|e| LocolError::Store(format!("query logs failed: {e}")))?;
            collect_rows(rows, "log")
        })?;

        with_attributes(raw, |log, attrs| log.attributes = attrs)
    }
}

fn resource_filter(
    resource_ids: &[String],
    window: &TimeWindow,
    time_column: &str,
) -> (String, Vec<Value>) {
    let placeholders = vec!["?"; resource_ids.len()].join(", ");
    let mut where_parts = vec![format!("resource_id IN ({placeholders})")];
    let mut args = resource_ids
        .iter()
        .map(|id| Value::Text(id.clone()))
        .collect::<Vec<_>>();

    if let Some(since) = window.since {
        where_parts.push(format!("{time_column} >= ?"));
        args.push(timestamp(&since));
    }
    if let Some(until) = window.until {
        where_parts.push(format!("{time_column} < ?"));
        args.push(timestamp(&until));
    }

    (format!("WHERE {}", where_parts.join(" AND ")), args)
}

fn collect_rows<T>(
    rows: impl Iterator<Item = duckdb::Result<T>>,
    what: &str,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| LocolError::Store(format!("map {what} row failed: {e}")))?);
    }
    Ok(out)
}

fn with_attributes<T>(
    raw: Vec<(String, T)>,
    mut set: impl FnMut(&mut T, Attributes),
) -> Result<Vec<T>> {
    raw.into_iter()
        .map(|(encoded, mut row)| {
            set(&mut row, Attributes::decode(&encoded)?);
            Ok(row)
        })
        .collect()
}
