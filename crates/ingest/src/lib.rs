pub mod handlers;
pub mod ingestor;
pub mod otlp;
pub mod pipeline;
pub mod server;

pub use handlers::{LogHandler, MetricHandler, ScopeHandler, SignalHandler, SpanHandler};
pub use ingestor::{IngestReport, Ingestor};
pub use pipeline::{Batch, Pipeline, PipelineConfig};
