use chrono::Utc;
use locol_core::attrs::{AttrValue, Attributes};
use locol_core::ids::{hex_encode, new_id};
use locol_core::model::log::LogRow;
use locol_core::model::metric::{MetricPointMode, MetricPointRow, MetricType};
use locol_core::model::scope::ScopeRow;
use locol_core::model::span::SpanRow;
use locol_core::time::nanos_to_datetime;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::logs::v1::LogRecord as OtlpLogRecord;
use opentelemetry_proto::tonic::metrics::v1::metric::Data;
use opentelemetry_proto::tonic::metrics::v1::{Metric, NumberDataPoint, number_data_point};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;

pub fn attributes_from_otlp(attrs: &[KeyValue]) -> Attributes {
    attrs
        .iter()
        .map(|kv| (kv.key.clone(), attr_value_from_otlp(kv.value.as_ref())))
        .collect()
}

pub fn attr_value_from_otlp(value: Option<&AnyValue>) -> AttrValue {
    match value.and_then(|v| v.value.as_ref()) {
        None => AttrValue::Empty,
        Some(Value::StringValue(s)) => AttrValue::String(s.clone()),
        Some(Value::BoolValue(b)) => AttrValue::Bool(*b),
        Some(Value::IntValue(i)) => AttrValue::Int(*i),
        Some(Value::DoubleValue(d)) => AttrValue::Double(*d),
        Some(Value::BytesValue(b)) => AttrValue::Bytes(b.clone()),
        Some(Value::ArrayValue(arr)) => AttrValue::Array(
            arr.values
                .iter()
                .map(|v| attr_value_from_otlp(Some(v)))
                .collect(),
        ),
        Some(Value::KvlistValue(kvs)) => AttrValue::KvList(attributes_from_otlp(&kvs.values)),
    }
}

/// Resource attributes and dropped count; an absent resource has neither.
pub fn decode_resource(resource: Option<&Resource>) -> (Attributes, u32) {
    resource
        .map(|r| (attributes_from_otlp(&r.attributes), r.dropped_attributes_count))
        .unwrap_or_default()
}

pub fn decode_scope(scope: Option<&InstrumentationScope>, resource_id: &str) -> ScopeRow {
    let (name, version, attributes, dropped) = scope
        .map(|s| {
            (
                s.name.clone(),
                s.version.clone(),
                attributes_from_otlp(&s.attributes),
                s.dropped_attributes_count,
            )
        })
        .unwrap_or_default();

    ScopeRow {
        scope_id: new_id(),
        resource_id: resource_id.to_string(),
        name,
        version,
        attributes,
        dropped_attributes_count: dropped,
        timestamp: Utc::now(),
    }
}

pub fn decode_span(span: &OtlpSpan, resource_id: &str, scope_id: &str) -> SpanRow {
    SpanRow {
        trace_id: hex_encode(&span.trace_id),
        span_id: hex_encode(&span.span_id),
        parent_span_id: (!span.parent_span_id.is_empty()).then(|| hex_encode(&span.parent_span_id)),
        resource_id: resource_id.to_string(),
        scope_id: scope_id.to_string(),
        name: span.name.clone(),
        kind: span.kind,
        attributes: attributes_from_otlp(&span.attributes),
        start_time: nanos_to_datetime(span.start_time_unix_nano),
        end_time: nanos_to_datetime(span.end_time_unix_nano),
    }
}

/// One sample taken from a data point of any metric shape.
struct Sample<'a> {
    value: f64,
    time_unix_nano: u64,
    attributes: &'a [KeyValue],
}

pub fn decode_metric(
    metric: &Metric,
    resource_id: &str,
    scope_id: &str,
    mode: MetricPointMode,
) -> Vec<MetricPointRow> {
    let (metric_type, samples) = metric_samples(metric);

    let row = |value: f64, time, attributes: Attributes| MetricPointRow {
        metric_point_id: new_id(),
        resource_id: resource_id.to_string(),
        scope_id: scope_id.to_string(),
        metric_name: metric.name.clone(),
        description: metric.description.clone(),
        unit: metric.unit.clone(),
        metric_type,
        value,
        attributes,
        time,
    };

    if samples.is_empty() {
        return vec![row(0.0, Utc::now(), Attributes::new())];
    }

    let take = match mode {
        MetricPointMode::First => 1,
        MetricPointMode::All => samples.len(),
    };
    samples
        .into_iter()
        .take(take)
        .map(|s| {
            row(
                s.value,
                nanos_to_datetime(s.time_unix_nano),
                attributes_from_otlp(s.attributes),
            )
        })
        .collect()
}

fn metric_samples(metric: &Metric) -> (MetricType, Vec<Sample<'_>>) {
    match &metric.data {
        Some(Data::Gauge(g)) => (MetricType::Gauge, number_samples(&g.data_points)),
        Some(Data::Sum(s)) => (MetricType::Sum, number_samples(&s.data_points)),
        Some(Data::Histogram(h)) => (
            MetricType::Histogram,
            h.data_points
                .iter()
                .map(|p| Sample {
                    value: p.sum.unwrap_or(p.count as f64),
                    time_unix_nano: p.time_unix_nano,
                    attributes: &p.attributes,
                })
                .collect(),
        ),
        Some(Data::ExponentialHistogram(h)) => (
            MetricType::ExponentialHistogram,
            h.data_points
                .iter()
                .map(|p| Sample {
                    value: p.sum.unwrap_or(p.count as f64),
                    time_unix_nano: p.time_unix_nano,
                    attributes: &p.attributes,
                })
                .collect(),
        ),
        Some(Data::Summary(s)) => (
            MetricType::Summary,
            s.data_points
                .iter()
                .map(|p| Sample {
                    value: p.sum,
                    time_unix_nano: p.time_unix_nano,
                    attributes: &p.attributes,
                })
                .collect(),
        ),
        None => (MetricType::Unknown, Vec::new()),
    }
}

fn number_samples(points: &[NumberDataPoint]) -> Vec<Sample<'_>> {
    points
        .iter()
        .map(|p| Sample {
            value: match p.value {
                Some(number_data_point::Value::AsDouble(d)) => d,
                Some(number_data_point::Value::AsInt(i)) => i as f64,
                None => 0.0,
            },
            time_unix_nano: p.time_unix_nano,
            attributes: &p.attributes,
        })
        .collect()
}

pub fn decode_log(record: &OtlpLogRecord, resource_id: &str, scope_id: &str) -> LogRow {
    let nanos = if record.time_unix_nano != 0 {
        record.time_unix_nano
    } else {
        record.observed_time_unix_nano
    };
    let timestamp = if nanos == 0 {
        Utc::now()
    } else {
        nanos_to_datetime(nanos)
    };

    LogRow {
        log_id: new_id(),
        resource_id: resource_id.to_string(),
        scope_id: scope_id.to_string(),
        severity_text: record.severity_text.clone(),
        severity_number: record.severity_number,
        body: attr_value_from_otlp(record.body.as_ref()).canonical_text(),
        attributes: attributes_from_otlp(&record.attributes),
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry_proto::tonic::common::v1::{ArrayValue, KeyValueList};
    use opentelemetry_proto::tonic::metrics::v1::{
        ExponentialHistogram, ExponentialHistogramDataPoint, Summary, SummaryDataPoint,
    };
    use testkit::{
        BASE_NANOS, any, counter, gauge, histogram, kv_bool, kv_double, kv_int, kv_str,
        number_point,
    };

    use super::*;

    #[test]
    fn converts_nested_values() {
        let attrs = attributes_from_otlp(&[
            kv_str("service.name", "api"),
            kv_int("pid", 42),
            kv_double("ratio", 0.5),
            kv_bool("sampled", true),
            KeyValue {
                key: "tags".into(),
                value: any(Value::ArrayValue(ArrayValue {
                    values: vec![AnyValue {
                        value: Some(Value::StringValue("a".into())),
                    }],
                })),
            },
            KeyValue {
                key: "nested".into(),
                value: any(Value::KvlistValue(KeyValueList {
                    values: vec![kv_str("inner", "x")],
                })),
            },
            KeyValue {
                key: "unset".into(),
                value: None,
            },
        ]);
        assert_eq!(
            attrs.encode(),
            concat!(
                r#"{"nested":{"inner":"x"},"pid":42,"ratio":0.5,"sampled":true,"#,
                r#""service.name":"api","tags":["a"],"unset":null}"#
            )
        );
    }

    #[test]
    fn span_ids_are_hex_and_empty_parent_is_none() {
        let mut span = testkit::span([0xaa; 16], [0xbb; 8], "GET /users", 0);
        let row = decode_span(&span, "r", "s");
        assert_eq!(row.trace_id, "aa".repeat(16));
        assert_eq!(row.span_id, "bb".repeat(8));
        assert_eq!(row.parent_span_id, None);
        assert_eq!(row.duration_ms(), 25);

        span.parent_span_id = vec![0x01; 8];
        let row = decode_span(&span, "r", "s");
        assert_eq!(row.parent_span_id.as_deref(), Some("0101010101010101"));
    }

    #[test]
    fn gauge_takes_first_point_by_default() {
        let metric = gauge(
            "latency",
            "ms",
            vec![
                number_point(number_data_point::Value::AsDouble(3.14), 0),
                number_point(number_data_point::Value::AsDouble(9.0), 10),
            ],
        );
        let rows = decode_metric(&metric, "r", "s", MetricPointMode::First);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 3.14);
        assert_eq!(rows[0].unit, "ms");
        assert_eq!(rows[0].metric_type, MetricType::Gauge);
        assert_eq!(rows[0].time, nanos_to_datetime(BASE_NANOS));

        let rows = decode_metric(&metric, "r", "s", MetricPointMode::All);
        assert_eq!(rows.iter().map(|r| r.value).collect::<Vec<_>>(), vec![3.14, 9.0]);
    }

    #[test]
    fn int_sum_is_converted_to_double() {
        let rows = decode_metric(&counter("requests", 7), "r", "s", MetricPointMode::First);
        assert_eq!(rows[0].value, 7.0);
        assert_eq!(rows[0].metric_type, MetricType::Sum);
    }

    #[test]
    fn histograms_prefer_sum_then_count() {
        let rows = decode_metric(&histogram("h", Some(12.5), 4), "r", "s", MetricPointMode::First);
        assert_eq!(rows[0].value, 12.5);
        let rows = decode_metric(&histogram("h", None, 4), "r", "s", MetricPointMode::First);
        assert_eq!(rows[0].value, 4.0);

        let exp = Metric {
            name: "exp".into(),
            data: Some(Data::ExponentialHistogram(ExponentialHistogram {
                data_points: vec![ExponentialHistogramDataPoint {
                    count: 3,
                    sum: None,
                    ..Default::default()
                }],
                aggregation_temporality: 2,
            })),
            ..Default::default()
        };
        let rows = decode_metric(&exp, "r", "s", MetricPointMode::First);
        assert_eq!(rows[0].metric_type, MetricType::ExponentialHistogram);
        assert_eq!(rows[0].value, 3.0);

        let summary = Metric {
            name: "sum".into(),
            data: Some(Data::Summary(Summary {
                data_points: vec![SummaryDataPoint {
                    sum: 8.0,
                    count: 2,
                    ..Default::default()
                }],
            })),
            ..Default::default()
        };
        let rows = decode_metric(&summary, "r", "s", MetricPointMode::First);
        assert_eq!(rows[0].metric_type, MetricType::Summary);
        assert_eq!(rows[0].value, 8.0);
    }

    #[test]
    fn metric_without_points_yields_zero_now() {
        let before = Utc::now();
        let empty = gauge("idle", "1", vec![]);
        let rows = decode_metric(&empty, "r", "s", MetricPointMode::All);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 0.0);
        assert!(rows[0].time >= before);

        let unknown = Metric {
            name: "mystery".into(),
            ..Default::default()
        };
        let rows = decode_metric(&unknown, "r", "s", MetricPointMode::First);
        assert_eq!(rows[0].metric_type, MetricType::Unknown);
        assert_eq!(rows[0].value, 0.0);
    }

    #[test]
    fn log_body_and_timestamp_fallbacks() {
        let mut record = testkit::log("boom", "ERROR", 17, 0);
        record.attributes = vec![kv_str("peer", "redis:6379")];
        let row = decode_log(&record, "r", "s");
        assert_eq!(row.body, "boom");
        assert_eq!(row.severity_text, "ERROR");
        assert_eq!(row.timestamp, nanos_to_datetime(BASE_NANOS));

        record.time_unix_nano = 0;
        record.observed_time_unix_nano = BASE_NANOS + 1_000;
        record.body = any(Value::IntValue(5));
        let row = decode_log(&record, "r", "s");
        assert_eq!(row.body, "5");
        assert_eq!(row.timestamp, nanos_to_datetime(BASE_NANOS + 1_000));

        record.observed_time_unix_nano = 0;
        record.body = None;
        let before = Utc::now();
        let row = decode_log(&record, "r", "s");
        assert_eq!(row.body, "");
        assert!(row.timestamp >= before);
    }

    #[test]
    fn absent_scope_is_empty() {
        let row = decode_scope(None, "r");
        assert_eq!(row.name, "");
        assert_eq!(row.version, "");
        assert!(row.attributes.is_empty());
        assert_eq!(row.resource_id, "r");
    }

    #[test]
    fn absent_resource_has_no_attributes() {
        let (attrs, dropped) = decode_resource(None);
        assert!(attrs.is_empty());
        assert_eq!(dropped, 0);
    }
}
