use locol_core::attrs::Attributes;
use locol_core::filter::TimeWindow;
use locol_core::model::log::LogRow;
use locol_core::model::metric::MetricPointRow;
use locol_core::model::span::SpanRow;
use locol_core::query::{ColumnarResult, ResourceAttributeGroup, StatusResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiRequest {
    Query(String),
    ResourceGroups {
        primary_key: Option<String>,
    },
    ResourceIds {
        key: String,
        value: String,
    },
    Spans {
        resource_ids: Vec<String>,
        #[serde(default)]
        window: TimeWindow,
    },
    Metrics {
        resource_ids: Vec<String>,
        #[serde(default)]
        window: TimeWindow,
    },
    Logs {
        resource_ids: Vec<String>,
        #[serde(default)]
        window: TimeWindow,
    },
    ResourceAttributes(String),
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiResponse {
    Query(ColumnarResult),
    Groups(Vec<ResourceAttributeGroup>),
    ResourceIds(Vec<String>),
    Spans(Vec<SpanRow>),
    Metrics(Vec<MetricPointRow>),
    Logs(Vec<LogRow>),
    Attributes(Attributes),
    Status(StatusResponse),
    Error(String),
}
