use std::io::Read;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::routing::post;
use axum::{Router, body::Bytes};
use flate2::read::GzDecoder;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::pipeline::Pipeline;

/// Upper bound on a gzip body after inflation.
const MAX_INFLATED_BODY: u64 = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct HttpIngestState {
    pub pipeline: Pipeline,
}

pub fn router(pipeline: Pipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/v1/logs", post(export_logs))
        .route("/v1/traces", post(export_traces))
        .route("/v1/metrics", post(export_metrics))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .with_state(HttpIngestState { pipeline })
}

/// Decodes a protobuf body, inflating it first when it arrived gzip-encoded.
fn decode_body<M: Message + Default>(headers: &HeaderMap, body: Bytes) -> Result<M, StatusCode> {
    decode_body_within(headers, body, MAX_INFLATED_BODY)
}

fn decode_body_within<M: Message + Default>(
    headers: &HeaderMap,
    body: Bytes,
    limit: u64,
) -> Result<M, StatusCode> {
    let gzip = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

    if !gzip {
        return M::decode(body).map_err(|_| StatusCode::BAD_REQUEST);
    }

    // One byte past the limit is enough to tell an oversized body apart.
    let mut raw = Vec::new();
    GzDecoder::new(body.as_ref())
        .take(limit + 1)
        .read_to_end(&mut raw)
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    if raw.len() as u64 > limit {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    M::decode(raw.as_slice()).map_err(|_| StatusCode::BAD_REQUEST)
}

fn accepted(result: locol_core::Result<usize>, signal: &str) -> StatusCode {
    match result {
        Ok(batches) => {
            tracing::debug!(batches, signal, "otlp http export accepted");
            StatusCode::OK
        }
        Err(err) => {
            tracing::warn!(error = %err, signal, "otlp http export not queued");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn export_logs(
    State(state): State<HttpIngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let req = match decode_body::<ExportLogsServiceRequest>(&headers, body) {
        Ok(req) => req,
        Err(status) => {
            tracing::warn!(%status, "otlp http logs decode failed");
            return status;
        }
    };
    accepted(state.pipeline.submit_logs(req).await, "log")
}

async fn export_traces(
    State(state): State<HttpIngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let req = match decode_body::<ExportTraceServiceRequest>(&headers, body) {
        Ok(req) => req,
        Err(status) => {
            tracing::warn!(%status, "otlp http traces decode failed");
            return status;
        }
    };
    accepted(state.pipeline.submit_traces(req).await, "span")
}

async fn export_metrics(
    State(state): State<HttpIngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let req = match decode_body::<ExportMetricsServiceRequest>(&headers, body) {
        Ok(req) => req,
        Err(status) => {
            tracing::warn!(%status, "otlp http metrics decode failed");
            return status;
        }
    };
    accepted(state.pipeline.submit_metrics(req).await, "metric")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn decodes_plain_and_gzip_bodies() {
        let req = testkit::api_trace_request();
        let plain = Bytes::from(req.encode_to_vec());
        let decoded =
            decode_body::<ExportTraceServiceRequest>(&HeaderMap::new(), plain.clone()).unwrap();
        assert_eq!(decoded, req);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain).unwrap();
        let gz = Bytes::from(encoder.finish().unwrap());
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
        let decoded = decode_body::<ExportTraceServiceRequest>(&headers, gz).unwrap();
        assert_eq!(decoded, req);
    }

    fn gzip_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
        headers
    }

    fn gzip(raw: &[u8]) -> Bytes {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    #[test]
    fn rejects_garbage() {
        let err = decode_body::<ExportLogsServiceRequest>(
            &gzip_headers(),
            Bytes::from_static(b"nope"),
        )
        .unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);

        let err = decode_body::<ExportLogsServiceRequest>(
            &HeaderMap::new(),
            Bytes::from_static(&[0xff, 0xff, 0xff]),
        )
        .unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn gzip_body_inflating_past_the_limit_is_too_large() {
        // Zeros compress to almost nothing.
        let bomb = gzip(&vec![0u8; 64 * 1024]);
        assert!(bomb.len() < 1024);

        let err =
            decode_body_within::<ExportLogsServiceRequest>(&gzip_headers(), bomb, 4096)
                .unwrap_err();
        assert_eq!(err, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn gzip_body_at_the_limit_still_decodes() {
        let raw = testkit::api_trace_request().encode_to_vec();
        let limit = raw.len() as u64;
        let decoded = decode_body_within::<ExportTraceServiceRequest>(
            &gzip_headers(),
            gzip(&raw),
            limit,
        )
        .unwrap();
        assert_eq!(decoded, testkit::api_trace_request());
    }
}
