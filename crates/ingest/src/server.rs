use std::net::SocketAddr;

use locol_core::error::{LocolError, Result};
use tonic::transport::Server;
use tracing::info;

use crate::otlp::grpc::GrpcIngest;
use crate::otlp::http;
use crate::pipeline::Pipeline;

/// Serves OTLP over gRPC and HTTP until either listener fails.
pub async fn run_ingest_servers(
    pipeline: Pipeline,
    grpc_addr: SocketAddr,
    http_addr: SocketAddr,
) -> Result<()> {
    let grpc = GrpcIngest::new(pipeline.clone());
    let http_router = http::router(pipeline);

    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .map_err(|e| LocolError::Io(format!("failed to bind OTLP/HTTP on {http_addr}: {e}")))?;
    info!(%grpc_addr, %http_addr, "otlp receivers listening");

    let grpc_task = tokio::spawn(async move {
        Server::builder()
            .add_service(grpc.logs_service())
            .add_service(grpc.traces_service())
            .add_service(grpc.metrics_service())
            .serve(grpc_addr)
            .await
    });

    let http_task =
        tokio::spawn(async move { axum::serve(http_listener, http_router).await });

    tokio::select! {
        res = grpc_task => {
            let inner = res.map_err(|e| LocolError::Ingest(format!("gRPC task join failed: {e}")))?;
            inner.map_err(|e| LocolError::Ingest(format!("gRPC server failed: {e}")))
        }
        res = http_task => {
            let inner = res.map_err(|e| LocolError::Ingest(format!("HTTP task join failed: {e}")))?;
            inner.map_err(|e| LocolError::Ingest(format!("HTTP server failed: {e}")))
        }
    }
}
