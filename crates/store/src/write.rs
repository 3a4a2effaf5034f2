use chrono::{DateTime, Utc};
use duckdb::types::{TimeUnit, Value};
use locol_core::error::Result;
use locol_core::model::log::LogRow;
use locol_core::model::metric::MetricPointRow;
use locol_core::model::resource::{ResourceAttributeMapping, ResourceAttributeRow, ResourceRow};
use locol_core::model::scope::ScopeRow;
use locol_core::model::span::SpanRow;

use crate::Store;
use crate::db::WriteGuard;
use crate::schema::Table;

impl Store {
    pub fn append_span(&self, span: &SpanRow) -> Result<()> {
        self.append(Table::Spans, span_values(span))
    }

    /// Points decoded from one metric land together or not at all.
    pub fn append_metric_points(&self, points: &[MetricPointRow]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let guard = self.write_lock();
        let rows = points.iter().map(metric_point_values).collect();
        self.append_all_with(&guard, Table::MetricPoints, rows)
    }

    pub fn append_log(&self, log: &LogRow) -> Result<()> {
        self.append(Table::LogRecords, log_values(log))
    }

    pub fn append_scope(&self, scope: &ScopeRow) -> Result<()> {
        self.append(Table::InstrumentationScopes, scope_values(scope))
    }

    pub(crate) fn append_resource(&self, guard: &WriteGuard<'_>, row: &ResourceRow) -> Result<()> {
        self.append_with(
            guard,
            Table::Resources,
            vec![
                text(&row.resource_id),
                timestamp(&row.timestamp),
                Value::UInt(row.dropped_attributes_count),
            ],
        )
    }

    pub(crate) fn append_resource_attribute(
        &self,
        guard: &WriteGuard<'_>,
        row: &ResourceAttributeRow,
    ) -> Result<()> {
        self.append_with(
            guard,
            Table::ResourceAttributes,
            vec![
                text(&row.attribute_id),
                text(&row.key),
                text(&row.value),
                timestamp(&row.timestamp),
            ],
        )
    }

    pub(crate) fn append_mapping(
        &self,
        guard: &WriteGuard<'_>,
        row: &ResourceAttributeMapping,
    ) -> Result<()> {
        self.append_with(
            guard,
            Table::ResourceAttributeMappings,
            vec![text(&row.resource_id), text(&row.attribute_id)],
        )
    }
}

fn span_values(span: &SpanRow) -> Vec<Value> {
    vec![
        text(&span.trace_id),
        text(&span.span_id),
        span.parent_span_id
            .as_deref()
            .map(text)
            .unwrap_or(Value::Null),
        text(&span.resource_id),
        text(&span.scope_id),
        text(&span.name),
        Value::Int(span.kind),
        Value::Text(span.attributes.encode()),
        timestamp(&span.start_time),
        timestamp(&span.end_time),
    ]
}

fn metric_point_values(point: &MetricPointRow) -> Vec<Value> {
    vec![
        text(&point.metric_point_id),
        text(&point.resource_id),
        text(&point.scope_id),
        text(&point.metric_name),
        text(&point.description),
        text(&point.unit),
        text(point.metric_type.as_str()),
        Value::Double(point.value),
        Value::Text(point.attributes.encode()),
        timestamp(&point.time),
    ]
}

fn log_values(log: &LogRow) -> Vec<Value> {
    vec![
        text(&log.log_id),
        text(&log.resource_id),
        text(&log.scope_id),
        text(&log.severity_text),
        Value::Int(log.severity_number),
        text(&log.body),
        Value::Text(log.attributes.encode()),
        timestamp(&log.timestamp),
    ]
}

fn scope_values(scope: &ScopeRow) -> Vec<Value> {
    vec![
        text(&scope.scope_id),
        text(&scope.resource_id),
        text(&scope.name),
        text(&scope.version),
        Value::Text(scope.attributes.encode()),
        Value::UInt(scope.dropped_attributes_count),
        timestamp(&scope.timestamp),
    ]
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(crate) fn timestamp(ts: &DateTime<Utc>) -> Value {
    Value::Timestamp(TimeUnit::Microsecond, ts.timestamp_micros())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use locol_core::attrs::Attributes;
    use locol_core::error::LocolError;
    use locol_core::model::metric::MetricType;

    use super::*;

    fn span(trace_id: &str, span_id: &str, name: &str) -> SpanRow {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        SpanRow {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id: None,
            resource_id: "r1".into(),
            scope_id: "s1".into(),
            name: name.into(),
            kind: 2,
            attributes: Attributes::new(),
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(40),
        }
    }

    #[test]
    fn duplicate_span_key_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.append_span(&span("t1", "s1", "first")).unwrap();
        let err = store.append_span(&span("t1", "s1", "second")).unwrap_err();
        assert!(matches!(err, LocolError::Store(_)));

        let names = store
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*), MIN(name) FROM spans
                     WHERE trace_id = 't1' AND span_id = 's1'",
                    [],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
                )
                .map_err(|e| LocolError::Store(e.to_string()))
            })
            .unwrap();
        assert_eq!(names, (1, "first".to_string()));
    }

    fn point(id: &str, value: f64, time: DateTime<Utc>) -> MetricPointRow {
        MetricPointRow {
            metric_point_id: id.into(),
            resource_id: "r1".into(),
            scope_id: "s1".into(),
            metric_name: "queue.depth".into(),
            description: String::new(),
            unit: "1".into(),
            metric_type: MetricType::Sum,
            value,
            attributes: Attributes::new(),
            time,
        }
    }

    fn metric_point_count(store: &Store) -> i64 {
        store
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM metric_points", [], |row| row.get(0))
                    .map_err(|e| LocolError::Store(e.to_string()))
            })
            .unwrap()
    }

    #[test]
    fn metric_point_keeps_type_and_timestamp() {
        let store = Store::open_in_memory().unwrap();
        let time = Utc.with_ymd_and_hms(2026, 2, 1, 12, 30, 0).unwrap()
            + chrono::Duration::microseconds(250);
        store.append_metric_points(&[point("m1", 12.0, time)]).unwrap();

        let (ty, stored) = store
            .with_conn(|conn| {
                conn.query_row(
                    r#"SELECT "type", "time" FROM metric_points"#,
                    [],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, chrono::NaiveDateTime>(1)?,
                        ))
                    },
                )
                .map_err(|e| LocolError::Store(e.to_string()))
            })
            .unwrap();
        assert_eq!(ty, "sum");
        assert_eq!(stored.and_utc(), time);
    }

    #[test]
    fn metric_points_of_one_metric_are_all_or_nothing() {
        let store = Store::open_in_memory().unwrap();
        let time = Utc.with_ymd_and_hms(2026, 2, 1, 12, 30, 0).unwrap();
        let err = store
            .append_metric_points(&[
                point("m1", 1.0, time),
                point("m2", 2.0, time),
                point("m1", 3.0, time),
            ])
            .unwrap_err();
        assert!(matches!(err, LocolError::Store(_)));
        assert_eq!(metric_point_count(&store), 0);

        store
            .append_metric_points(&[point("m1", 1.0, time), point("m2", 2.0, time)])
            .unwrap();
        store.append_metric_points(&[]).unwrap();
        assert_eq!(metric_point_count(&store), 2);
    }
}
