use locol_core::error::{LocolError, Result};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use opentelemetry_proto::tonic::metrics::v1::ResourceMetrics;
use opentelemetry_proto::tonic::trace::v1::ResourceSpans;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::ingestor::Ingestor;

/// One resource-scoped unit of work for the writer.
pub enum Batch {
    Spans(ResourceSpans),
    Metrics(ResourceMetrics),
    Logs(ResourceLogs),
    /// Answered once every batch queued before it has been written.
    Barrier(oneshot::Sender<()>),
}

/// Handle to the single writer task. Cloning shares the same queue.
#[derive(Clone)]
pub struct Pipeline {
    tx: mpsc::Sender<Batch>,
}

pub struct PipelineConfig {
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 512,
        }
    }
}

impl Pipeline {
    pub fn new(ingestor: Ingestor, cfg: PipelineConfig) -> Self {
        let (tx, rx) = mpsc::channel(cfg.channel_capacity.max(1));
        tokio::spawn(run_writer(ingestor, rx));
        Self { tx }
    }

    pub async fn submit(&self, batch: Batch) -> Result<()> {
        self.tx
            .send(batch)
            .await
            .map_err(|_| LocolError::Ingest("pipeline closed".to_string()))
    }

    pub async fn submit_traces(&self, req: ExportTraceServiceRequest) -> Result<usize> {
        let count = req.resource_spans.len();
        for batch in req.resource_spans {
            self.submit(Batch::Spans(batch)).await?;
        }
        Ok(count)
    }

    pub async fn submit_metrics(&self, req: ExportMetricsServiceRequest) -> Result<usize> {
        let count = req.resource_metrics.len();
        for batch in req.resource_metrics {
            self.submit(Batch::Metrics(batch)).await?;
        }
        Ok(count)
    }

    pub async fn submit_logs(&self, req: ExportLogsServiceRequest) -> Result<usize> {
        let count = req.resource_logs.len();
        for batch in req.resource_logs {
            self.submit(Batch::Logs(batch)).await?;
        }
        Ok(count)
    }

    /// Waits until everything submitted so far has been written.
    pub async fn barrier(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(Batch::Barrier(tx)).await?;
        rx.await
            .map_err(|_| LocolError::Ingest("pipeline stopped before barrier".to_string()))
    }
}

async fn run_writer(ingestor: Ingestor, mut rx: mpsc::Receiver<Batch>) {
    while let Some(batch) = rx.recv().await {
        let (signal, result) = match batch {
            Batch::Spans(b) => ("span", ingestor.ingest_spans(&b)),
            Batch::Metrics(b) => ("metric", ingestor.ingest_metrics(&b)),
            Batch::Logs(b) => ("log", ingestor.ingest_logs(&b)),
            Batch::Barrier(done) => {
                let _ = done.send(());
                continue;
            }
        };
        if let Err(err) = result {
            warn!(signal, error = %err, "batch dropped");
        }
    }
    debug!("pipeline writer stopped");
}

#[cfg(test)]
mod tests {
    use locol_core::model::metric::MetricPointMode;
    use locol_store::Store;
    use testkit::{api_trace_request, latency_metrics_request, startup_logs_request};

    use super::*;

    fn pipeline(store: &Store) -> Pipeline {
        Pipeline::new(
            Ingestor::with_store(store.clone(), MetricPointMode::First),
            PipelineConfig {
                channel_capacity: 8,
            },
        )
    }

    #[tokio::test]
    async fn pipeline_writes_all_signals() {
        let store = Store::open_in_memory().unwrap();
        let pipeline = pipeline(&store);

        assert_eq!(pipeline.submit_traces(api_trace_request()).await.unwrap(), 1);
        pipeline
            .submit_metrics(latency_metrics_request("api"))
            .await
            .unwrap();
        pipeline
            .submit_logs(startup_logs_request("api"))
            .await
            .unwrap();
        pipeline.barrier().await.unwrap();

        let status = store.status().unwrap();
        assert_eq!(status.resources_count, 3);
        assert_eq!(status.attributes_count, 1);
        assert_eq!(status.spans_count, 1);
        assert_eq!(status.metrics_count, 1);
        assert_eq!(status.logs_count, 2);
    }

    #[tokio::test]
    async fn export_request_splits_per_resource() {
        let store = Store::open_in_memory().unwrap();
        let pipeline = pipeline(&store);

        let mut req = startup_logs_request("api");
        req.resource_logs
            .extend(startup_logs_request("worker").resource_logs);
        assert_eq!(pipeline.submit_logs(req).await.unwrap(), 2);

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let groups = store.resource_groups("service.name").unwrap();
        assert_eq!(
            groups.iter().map(|g| g.value.as_str()).collect::<Vec<_>>(),
            vec!["api", "worker"]
        );
    }

    #[tokio::test]
    async fn writer_survives_disconnected_store() {
        let store = Store::open_in_memory().unwrap();
        let pipeline = pipeline(&store);
        store.disconnect();

        pipeline.submit_traces(api_trace_request()).await.unwrap();
        pipeline.barrier().await.unwrap();

        store.connect().unwrap();
        pipeline.submit_traces(api_trace_request()).await.unwrap();
        pipeline.barrier().await.unwrap();
        assert_eq!(store.status().unwrap().spans_count, 1);
    }
}
