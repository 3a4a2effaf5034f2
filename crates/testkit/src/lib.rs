//! OTLP fixtures shared by the ingest and end-to-end tests.

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::metrics::v1::{
    Gauge, Histogram, HistogramDataPoint, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics,
    Sum, metric::Data, number_data_point,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

/// 2026-02-01T00:00:00Z in unix nanoseconds.
pub const BASE_NANOS: u64 = 1_769_904_000_000_000_000;

pub const API_TRACE_ID: [u8; 16] = [0xaa; 16];
pub const API_SPAN_ID: [u8; 8] = [0xbb; 8];

pub fn any(value: Value) -> Option<AnyValue> {
    Some(AnyValue { value: Some(value) })
}

pub fn kv_str(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: any(Value::StringValue(value.to_string())),
    }
}

pub fn kv_int(key: &str, value: i64) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: any(Value::IntValue(value)),
    }
}

pub fn kv_double(key: &str, value: f64) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: any(Value::DoubleValue(value)),
    }
}

pub fn kv_bool(key: &str, value: bool) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: any(Value::BoolValue(value)),
    }
}

pub fn resource(attributes: Vec<KeyValue>) -> Resource {
    Resource {
        attributes,
        ..Default::default()
    }
}

pub fn service(name: &str) -> Resource {
    resource(vec![kv_str("service.name", name)])
}

pub fn scope(name: &str, version: &str) -> InstrumentationScope {
    InstrumentationScope {
        name: name.to_string(),
        version: version.to_string(),
        ..Default::default()
    }
}

pub fn span(trace_id: [u8; 16], span_id: [u8; 8], name: &str, offset_ms: u64) -> Span {
    let start = BASE_NANOS + offset_ms * 1_000_000;
    Span {
        trace_id: trace_id.to_vec(),
        span_id: span_id.to_vec(),
        name: name.to_string(),
        kind: 2,
        start_time_unix_nano: start,
        end_time_unix_nano: start + 25_000_000,
        ..Default::default()
    }
}

pub fn resource_spans(
    resource: Resource,
    scope: InstrumentationScope,
    spans: Vec<Span>,
) -> ResourceSpans {
    ResourceSpans {
        resource: Some(resource),
        scope_spans: vec![ScopeSpans {
            scope: Some(scope),
            spans,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn number_point(value: number_data_point::Value, offset_ms: u64) -> NumberDataPoint {
    NumberDataPoint {
        time_unix_nano: BASE_NANOS + offset_ms * 1_000_000,
        value: Some(value),
        ..Default::default()
    }
}

pub fn gauge(name: &str, unit: &str, points: Vec<NumberDataPoint>) -> Metric {
    Metric {
        name: name.to_string(),
        unit: unit.to_string(),
        data: Some(Data::Gauge(Gauge { data_points: points })),
        ..Default::default()
    }
}

pub fn counter(name: &str, value: i64) -> Metric {
    Metric {
        name: name.to_string(),
        unit: "1".to_string(),
        data: Some(Data::Sum(Sum {
            data_points: vec![number_point(number_data_point::Value::AsInt(value), 0)],
            aggregation_temporality: 2,
            is_monotonic: true,
        })),
        ..Default::default()
    }
}

pub fn histogram(name: &str, sum: Option<f64>, count: u64) -> Metric {
    Metric {
        name: name.to_string(),
        unit: "ms".to_string(),
        data: Some(Data::Histogram(Histogram {
            data_points: vec![HistogramDataPoint {
                time_unix_nano: BASE_NANOS,
                count,
                sum,
                ..Default::default()
            }],
            aggregation_temporality: 2,
        })),
        ..Default::default()
    }
}

pub fn resource_metrics(
    resource: Resource,
    scope: InstrumentationScope,
    metrics: Vec<Metric>,
) -> ResourceMetrics {
    ResourceMetrics {
        resource: Some(resource),
        scope_metrics: vec![ScopeMetrics {
            scope: Some(scope),
            metrics,
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn log(body: &str, severity_text: &str, severity_number: i32, offset_ms: u64) -> LogRecord {
    LogRecord {
        time_unix_nano: BASE_NANOS + offset_ms * 1_000_000,
        severity_text: severity_text.to_string(),
        severity_number,
        body: any(Value::StringValue(body.to_string())),
        ..Default::default()
    }
}

pub fn resource_logs(
    resource: Resource,
    scope: InstrumentationScope,
    logs: Vec<LogRecord>,
) -> ResourceLogs {
    ResourceLogs {
        resource: Some(resource),
        scope_logs: vec![ScopeLogs {
            scope: Some(scope),
            log_records: logs,
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// `service.name=api` with a single `GET /users` span.
pub fn api_trace_request() -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![resource_spans(
            service("api"),
            scope("io.opentelemetry.http", "1.0.0"),
            vec![span(API_TRACE_ID, API_SPAN_ID, "GET /users", 0)],
        )],
    }
}

pub fn latency_metrics_request(service_name: &str) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![resource_metrics(
            service(service_name),
            scope("io.opentelemetry.runtime", "1.0.0"),
            vec![gauge(
                "http.server.latency",
                "ms",
                vec![number_point(number_data_point::Value::AsDouble(3.14), 0)],
            )],
        )],
    }
}

pub fn startup_logs_request(service_name: &str) -> ExportLogsServiceRequest {
    ExportLogsServiceRequest {
        resource_logs: vec![resource_logs(
            service(service_name),
            scope("app", ""),
            vec![
                log("starting", "INFO", 9, 0),
                log("listening on :8080", "INFO", 9, 5),
            ],
        )],
    }
}
