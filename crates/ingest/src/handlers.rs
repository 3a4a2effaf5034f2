use locol_core::error::Result;
use locol_core::model::metric::MetricPointMode;
use locol_store::Store;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::logs::v1::LogRecord;
use opentelemetry_proto::tonic::metrics::v1::Metric;
use opentelemetry_proto::tonic::trace::v1::Span;

use crate::otlp::decode::{decode_log, decode_metric, decode_scope, decode_span};

/// Maps one decoded record onto its table, given resolved resource and scope ids.
pub trait SignalHandler {
    type Record;

    fn handle(&self, record: &Self::Record, resource_id: &str, scope_id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct ScopeHandler {
    store: Store,
}

impl ScopeHandler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Scopes are never deduplicated; every call creates a new scope id.
    pub fn handle(
        &self,
        scope: Option<&InstrumentationScope>,
        resource_id: &str,
    ) -> Result<String> {
        let row = decode_scope(scope, resource_id);
        self.store.append_scope(&row)?;
        Ok(row.scope_id)
    }
}

#[derive(Clone)]
pub struct SpanHandler {
    store: Store,
}

impl SpanHandler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl SignalHandler for SpanHandler {
    type Record = Span;

    fn handle(&self, record: &Span, resource_id: &str, scope_id: &str) -> Result<()> {
        self.store
            .append_span(&decode_span(record, resource_id, scope_id))
    }
}

#[derive(Clone)]
pub struct MetricHandler {
    store: Store,
    mode: MetricPointMode,
}

impl MetricHandler {
    pub fn new(store: Store, mode: MetricPointMode) -> Self {
        Self { store, mode }
    }
}

impl SignalHandler for MetricHandler {
    type Record = Metric;

    fn handle(&self, record: &Metric, resource_id: &str, scope_id: &str) -> Result<()> {
        self.store
            .append_metric_points(&decode_metric(record, resource_id, scope_id, self.mode))
    }
}

#[derive(Clone)]
pub struct LogHandler {
    store: Store,
}

impl LogHandler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl SignalHandler for LogHandler {
    type Record = LogRecord;

    fn handle(&self, record: &LogRecord, resource_id: &str, scope_id: &str) -> Result<()> {
        self.store
            .append_log(&decode_log(record, resource_id, scope_id))
    }
}
