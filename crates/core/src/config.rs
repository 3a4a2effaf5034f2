use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LocolError, Result};
use crate::model::metric::MetricPointMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub otlp_grpc_addr: String,
    pub otlp_http_addr: String,
    pub query_tcp_addr: String,
    pub uds_path: PathBuf,
    pub db_threads: usize,
    pub channel_capacity: usize,
    pub primary_attribute_key: String,
    pub metric_points: MetricPointMode,
    pub status_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let xdg_runtime = env::var("XDG_RUNTIME_DIR").ok();
        let data_home = env::var("XDG_DATA_HOME").ok();

        let data_root = data_home
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(home).join(".local/share"));

        let uds_path = xdg_runtime
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join("locol"))
            .join("locol.sock");

        Self {
            otlp_grpc_addr: "127.0.0.1:4317".to_string(),
            otlp_http_addr: "127.0.0.1:4318".to_string(),
            query_tcp_addr: "127.0.0.1:1777".to_string(),
            uds_path,
            db_threads: 4,
            channel_capacity: 512,
            primary_attribute_key: "service.name".to_string(),
            metric_points: MetricPointMode::First,
            status_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    otlp_grpc_addr: Option<String>,
    otlp_http_addr: Option<String>,
    query_tcp_addr: Option<String>,
    uds_path: Option<PathBuf>,
    db_threads: Option<usize>,
    channel_capacity: Option<usize>,
    primary_attribute_key: Option<String>,
    metric_points: Option<String>,
    status_interval: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("LOCOL_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("locol/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| LocolError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| LocolError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        otlp_grpc_addr: env::var("LOCOL_OTLP_GRPC_ADDR").ok(),
        otlp_http_addr: env::var("LOCOL_OTLP_HTTP_ADDR").ok(),
        query_tcp_addr: env::var("LOCOL_QUERY_TCP_ADDR").ok(),
        uds_path: env::var("LOCOL_QUERY_UDS_PATH").ok().map(PathBuf::from),
        db_threads: parse_env_usize("LOCOL_DB_THREADS")?,
        channel_capacity: parse_env_usize("LOCOL_CHANNEL_CAPACITY")?,
        primary_attribute_key: env::var("LOCOL_PRIMARY_ATTRIBUTE_KEY").ok(),
        metric_points: env::var("LOCOL_METRIC_POINTS").ok(),
        status_interval: env::var("LOCOL_STATUS_INTERVAL").ok(),
    })
}

fn parse_env_usize(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(v) => v
            .parse::<usize>()
            .map(Some)
            .map_err(|e| LocolError::Config(format!("bad {name} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.otlp_grpc_addr {
        cfg.otlp_grpc_addr = v;
    }
    if let Some(v) = overrides.otlp_http_addr {
        cfg.otlp_http_addr = v;
    }
    if let Some(v) = overrides.query_tcp_addr {
        cfg.query_tcp_addr = v;
    }
    if let Some(v) = overrides.uds_path {
        cfg.uds_path = v;
    }
    if let Some(v) = overrides.db_threads {
        if v == 0 {
            return Err(LocolError::Config(format!(
                "bad db_threads in {source}: must be at least 1"
            )));
        }
        cfg.db_threads = v;
    }
    if let Some(v) = overrides.channel_capacity {
        if v == 0 {
            return Err(LocolError::Config(format!(
                "bad channel_capacity in {source}: must be at least 1"
            )));
        }
        cfg.channel_capacity = v;
    }
    if let Some(v) = overrides.primary_attribute_key {
        if v.trim().is_empty() {
            return Err(LocolError::Config(format!(
                "bad primary_attribute_key in {source}: cannot be empty"
            )));
        }
        cfg.primary_attribute_key = v;
    }
    if let Some(v) = overrides.metric_points {
        cfg.metric_points = v.parse().map_err(|e| {
            LocolError::Config(format!("bad metric_points in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.status_interval {
        let every = humantime::parse_duration(&v).map_err(|e| {
            LocolError::Config(format!("bad status_interval in {source}: {e} (value={v})"))
        })?;
        if every.is_zero() {
            return Err(LocolError::Config(format!(
                "status_interval in {source} must be greater than zero"
            )));
        }
        cfg.status_interval = every;
    }
    Ok(())
}
