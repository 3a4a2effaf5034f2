use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attrs::Attributes;
use crate::error::{LocolError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPointRow {
    pub metric_point_id: String,
    pub resource_id: String,
    pub scope_id: String,
    pub metric_name: String,
    pub description: String,
    pub unit: String,
    pub metric_type: MetricType,
    pub value: f64,
    pub attributes: Attributes,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Gauge,
    Sum,
    Histogram,
    ExponentialHistogram,
    Summary,
    Unknown,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Sum => "sum",
            MetricType::Histogram => "histogram",
            MetricType::ExponentialHistogram => "exponential_histogram",
            MetricType::Summary => "summary",
            MetricType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = LocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "sum" => Ok(Self::Sum),
            "histogram" => Ok(Self::Histogram),
            "exponential_histogram" => Ok(Self::ExponentialHistogram),
            "summary" => Ok(Self::Summary),
            "unknown" => Ok(Self::Unknown),
            _ => Err(LocolError::Parse(format!("unknown metric type: {s}"))),
        }
    }
}

/// How many rows a metric with several data points produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricPointMode {
    /// One row per metric, taken from its first data point.
    #[default]
    First,
    /// One row per data point.
    All,
}

impl FromStr for MetricPointMode {
    type Err = LocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "all" => Ok(Self::All),
            _ => Err(LocolError::Parse(format!("unknown metric point mode: {s}"))),
        }
    }
}
