use locol_core::error::Result;
use locol_core::model::metric::MetricPointMode;
use locol_store::Store;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::ResourceSpans;
use serde::Serialize;
use tracing::{debug, warn};

use crate::handlers::{LogHandler, MetricHandler, ScopeHandler, SignalHandler, SpanHandler};
use crate::otlp::decode::decode_resource;

/// Outcome of one resource-scoped batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub resource_id: String,
    pub scopes: usize,
    pub accepted: usize,
    pub failed: usize,
}

/// Resolves resources and scopes, then routes each record to its handler.
#[derive(Clone)]
pub struct Ingestor {
    store: Store,
    scopes: ScopeHandler,
    spans: SpanHandler,
    metrics: MetricHandler,
    logs: LogHandler,
}

impl Ingestor {
    pub fn new(
        store: Store,
        scopes: ScopeHandler,
        spans: SpanHandler,
        metrics: MetricHandler,
        logs: LogHandler,
    ) -> Self {
        Self {
            store,
            scopes,
            spans,
            metrics,
            logs,
        }
    }

    pub fn with_store(store: Store, metric_points: MetricPointMode) -> Self {
        Self::new(
            store.clone(),
            ScopeHandler::new(store.clone()),
            SpanHandler::new(store.clone()),
            MetricHandler::new(store.clone(), metric_points),
            LogHandler::new(store),
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ingest_spans(&self, batch: &ResourceSpans) -> Result<IngestReport> {
        self.ingest(
            "span",
            batch.resource.as_ref(),
            batch
                .scope_spans
                .iter()
                .map(|s| (s.scope.as_ref(), s.spans.as_slice())),
            &self.spans,
        )
    }

    pub fn ingest_metrics(&self, batch: &ResourceMetrics) -> Result<IngestReport> {
        self.ingest(
            "metric",
            batch.resource.as_ref(),
            batch
                .scope_metrics
                .iter()
                .map(|s| (s.scope.as_ref(), s.metrics.as_slice())),
            &self.metrics,
        )
    }

    pub fn ingest_logs(&self, batch: &ResourceLogs) -> Result<IngestReport> {
        self.ingest(
            "log",
            batch.resource.as_ref(),
            batch
                .scope_logs
                .iter()
                .map(|s| (s.scope.as_ref(), s.log_records.as_slice())),
            &self.logs,
        )
    }

    fn ingest<'a, H>(
        &self,
        signal: &'static str,
        resource: Option<&Resource>,
        scopes: impl Iterator<Item = (Option<&'a InstrumentationScope>, &'a [H::Record])>,
        handler: &H,
    ) -> Result<IngestReport>
    where
        H: SignalHandler,
        H::Record: 'a,
    {
        let (attributes, dropped) = decode_resource(resource);
        let resource_id = self.store.resolve_resource(&attributes, dropped)?;
        let mut report = IngestReport {
            resource_id,
            ..IngestReport::default()
        };

        for (scope, records) in scopes {
            let scope_id = match self.scopes.handle(scope, &report.resource_id) {
                Ok(id) => id,
                Err(err) => {
                    warn!(
                        signal,
                        error = %err,
                        records = records.len(),
                        "scope rejected; skipping its records"
                    );
                    report.failed += records.len();
                    continue;
                }
            };
            report.scopes += 1;

            for record in records {
                match handler.handle(record, &report.resource_id, &scope_id) {
                    Ok(()) => report.accepted += 1,
                    Err(err) => {
                        warn!(signal, error = %err, "record abandoned");
                        report.failed += 1;
                    }
                }
            }
        }

        debug!(
            signal,
            resource_id = %report.resource_id,
            scopes = report.scopes,
            accepted = report.accepted,
            failed = report.failed,
            "batch ingested"
        );
        Ok(report)
    }
}
