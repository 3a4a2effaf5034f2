use std::sync::Arc;

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{
    LogsService, LogsServiceServer,
};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status};

use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct GrpcIngest {
    pipeline: Arc<Pipeline>,
}

impl GrpcIngest {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn logs_service(&self) -> LogsServiceServer<Self> {
        LogsServiceServer::new(self.clone()).accept_compressed(CompressionEncoding::Gzip)
    }

    pub fn traces_service(&self) -> TraceServiceServer<Self> {
        TraceServiceServer::new(self.clone()).accept_compressed(CompressionEncoding::Gzip)
    }

    pub fn metrics_service(&self) -> MetricsServiceServer<Self> {
        MetricsServiceServer::new(self.clone()).accept_compressed(CompressionEncoding::Gzip)
    }
}

fn unavailable(err: locol_core::LocolError) -> Status {
    Status::unavailable(err.to_string())
}

#[tonic::async_trait]
impl LogsService for GrpcIngest {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> std::result::Result<Response<ExportLogsServiceResponse>, Status> {
        let batches = self
            .pipeline
            .submit_logs(request.into_inner())
            .await
            .map_err(unavailable)?;
        tracing::debug!(batches, "otlp grpc logs accepted");
        Ok(Response::new(ExportLogsServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl TraceService for GrpcIngest {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> std::result::Result<Response<ExportTraceServiceResponse>, Status> {
        let batches = self
            .pipeline
            .submit_traces(request.into_inner())
            .await
            .map_err(unavailable)?;
        tracing::debug!(batches, "otlp grpc traces accepted");
        Ok(Response::new(ExportTraceServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl MetricsService for GrpcIngest {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> std::result::Result<Response<ExportMetricsServiceResponse>, Status> {
        let batches = self
            .pipeline
            .submit_metrics(request.into_inner())
            .await
            .map_err(unavailable)?;
        tracing::debug!(batches, "otlp grpc metrics accepted");
        Ok(Response::new(ExportMetricsServiceResponse::default()))
    }
}
