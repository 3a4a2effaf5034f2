mod client;
mod output;
mod protocol;
mod query_server;
mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use locol_core::config::Config;
use locol_core::filter::TimeWindow;
use locol_core::model::metric::MetricPointMode;
use locol_ingest::{Ingestor, Pipeline, PipelineConfig};
use locol_store::Store;

use crate::client::QueryClient;
use crate::output::{
    print_attributes_human, print_groups_human, print_logs_human, print_metrics_human,
    print_query_human, print_resource_ids_human, print_spans_human, print_status_human,
};
use crate::protocol::{ApiRequest, ApiResponse};
use crate::query_server::QueryContext;
use crate::telemetry::{init_cli_tracing, init_run_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "locol")]
#[command(about = "Local OpenTelemetry store with resource-centric queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    uds: Option<PathBuf>,

    #[arg(long, global = true)]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the in-memory store, OTLP receivers and query server")]
    Run {
        #[arg(long)]
        otlp_grpc_addr: Option<String>,
        #[arg(long)]
        otlp_http_addr: Option<String>,
        #[arg(long)]
        query_tcp_addr: Option<String>,
        #[arg(long)]
        query_uds_path: Option<PathBuf>,
        #[arg(long)]
        db_threads: Option<usize>,
        #[arg(long)]
        primary_attribute_key: Option<String>,
        #[arg(long, help = "first or all")]
        metric_points: Option<String>,
        #[arg(long, help = "e.g. 30s, 5m")]
        status_interval: Option<String>,
    },
    #[command(about = "Execute SQL against the store")]
    Sql { sql: String },
    #[command(about = "List resources grouped by shared attribute")]
    Groups {
        #[arg(long, help = "Attribute key listed first (defaults to the server's)")]
        key: Option<String>,
    },
    #[command(about = "Resource ids carrying an attribute pair")]
    Resources { key: String, value: String },
    #[command(about = "Spans for the given resources")]
    Spans {
        #[arg(required = true)]
        resource_ids: Vec<String>,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
    },
    #[command(about = "Metric points for the given resources")]
    Metrics {
        #[arg(required = true)]
        resource_ids: Vec<String>,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
    },
    #[command(about = "Log records for the given resources")]
    Logs {
        #[arg(required = true)]
        resource_ids: Vec<String>,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
    },
    #[command(about = "Attributes of one resource")]
    Attributes { resource_id: String },
    Status,
}

struct RunArgs {
    otlp_grpc_addr: Option<String>,
    otlp_http_addr: Option<String>,
    query_tcp_addr: Option<String>,
    query_uds_path: Option<PathBuf>,
    db_threads: Option<usize>,
    primary_attribute_key: Option<String>,
    metric_points: Option<String>,
    status_interval: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let req = match cli.command {
        Commands::Run {
            otlp_grpc_addr,
            otlp_http_addr,
            query_tcp_addr,
            query_uds_path,
            db_threads,
            primary_attribute_key,
            metric_points,
            status_interval,
        } => {
            return run_server(RunArgs {
                otlp_grpc_addr,
                otlp_http_addr,
                query_tcp_addr,
                query_uds_path,
                db_threads,
                primary_attribute_key,
                metric_points,
                status_interval,
            })
            .await;
        }
        Commands::Sql { sql } => ApiRequest::Query(sql),
        Commands::Groups { key } => ApiRequest::ResourceGroups { primary_key: key },
        Commands::Resources { key, value } => ApiRequest::ResourceIds { key, value },
        Commands::Spans {
            resource_ids,
            since,
            until,
        } => ApiRequest::Spans {
            resource_ids,
            window: parse_window(since, until)?,
        },
        Commands::Metrics {
            resource_ids,
            since,
            until,
        } => ApiRequest::Metrics {
            resource_ids,
            window: parse_window(since, until)?,
        },
        Commands::Logs {
            resource_ids,
            since,
            until,
        } => ApiRequest::Logs {
            resource_ids,
            window: parse_window(since, until)?,
        },
        Commands::Attributes { resource_id } => ApiRequest::ResourceAttributes(resource_id),
        Commands::Status => ApiRequest::Status,
    };

    init_cli_tracing();
    let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
    let response = client.request(req).await?;
    print_response(response, cli.json)
}

async fn run_server(args: RunArgs) -> anyhow::Result<()> {
    let cfg = resolve_run_config(Config::load().context("load config")?, args)?;
    init_run_tracing();

    eprintln!("locol run");
    eprintln!("  ingest grpc: {}", cfg.otlp_grpc_addr);
    eprintln!("  ingest http: {}", cfg.otlp_http_addr);
    eprintln!("  query uds: {}", cfg.uds_path.display());
    eprintln!("  query tcp: {}", cfg.query_tcp_addr);

    let grpc_addr: SocketAddr = cfg
        .otlp_grpc_addr
        .parse()
        .with_context(|| format!("bad OTLP gRPC address {}", cfg.otlp_grpc_addr))?;
    let http_addr: SocketAddr = cfg
        .otlp_http_addr
        .parse()
        .with_context(|| format!("bad OTLP HTTP address {}", cfg.otlp_http_addr))?;
    let query_addr: SocketAddr = cfg
        .query_tcp_addr
        .parse()
        .with_context(|| format!("bad query address {}", cfg.query_tcp_addr))?;

    let store = Store::new(cfg.db_threads);
    store.connect().context("connect store")?;

    let pipeline = Pipeline::new(
        Ingestor::with_store(store.clone(), cfg.metric_points),
        PipelineConfig {
            channel_capacity: cfg.channel_capacity,
        },
    );

    let ingest_task = tokio::spawn(locol_ingest::server::run_ingest_servers(
        pipeline, grpc_addr, http_addr,
    ));

    let query_task = tokio::spawn(query_server::run_query_server(
        QueryContext {
            store: store.clone(),
            primary_key: cfg.primary_attribute_key.clone(),
        },
        cfg.uds_path.clone(),
        query_addr,
    ));

    let status_task = tokio::spawn(log_status(store.clone(), cfg.status_interval));

    let result = tokio::select! {
        res = ingest_task => {
            res.context("ingest task join")?.map_err(anyhow::Error::from)
        }
        res = query_task => {
            res.context("query task join")?
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            Ok(())
        }
    };

    status_task.abort();
    store.disconnect();
    let _ = tokio::fs::remove_file(&cfg.uds_path).await;
    shutdown_tracing();
    result
}

fn resolve_run_config(mut cfg: Config, args: RunArgs) -> anyhow::Result<Config> {
    if let Some(v) = args.otlp_grpc_addr {
        cfg.otlp_grpc_addr = v;
    }
    if let Some(v) = args.otlp_http_addr {
        cfg.otlp_http_addr = v;
    }
    if let Some(v) = args.query_tcp_addr {
        cfg.query_tcp_addr = v;
    }
    if let Some(v) = args.query_uds_path {
        cfg.uds_path = v;
    }
    if let Some(v) = args.db_threads {
        anyhow::ensure!(v > 0, "--db-threads must be at least 1");
        cfg.db_threads = v;
    }
    if let Some(v) = args.primary_attribute_key {
        anyhow::ensure!(!v.trim().is_empty(), "--primary-attribute-key cannot be empty");
        cfg.primary_attribute_key = v;
    }
    if let Some(v) = args.metric_points {
        cfg.metric_points = v
            .parse::<MetricPointMode>()
            .context("bad --metric-points")?;
    }
    if let Some(v) = args.status_interval {
        let every = humantime::parse_duration(&v)
            .with_context(|| format!("bad --status-interval {v}"))?;
        anyhow::ensure!(!every.is_zero(), "--status-interval must be greater than zero");
        cfg.status_interval = every;
    }
    Ok(cfg)
}

async fn log_status(store: Store, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        interval.tick().await;
        match store.status() {
            Ok(s) => tracing::info!(
                connected = s.connected,
                resources = s.resources_count,
                attributes = s.attributes_count,
                scopes = s.scopes_count,
                spans = s.spans_count,
                metrics = s.metrics_count,
                logs = s.logs_count,
                "store status"
            ),
            Err(err) => tracing::warn!(error = %err, "status check failed"),
        }
    }
}

fn parse_window(since: Option<String>, until: Option<String>) -> anyhow::Result<TimeWindow> {
    Ok(TimeWindow::parse(since.as_deref(), until.as_deref())?)
}

fn print_response(response: ApiResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        if let ApiResponse::Error(e) = response {
            anyhow::bail!(e);
        }
        return Ok(());
    }

    match response {
        ApiResponse::Query(v) => print_query_human(&v),
        ApiResponse::Groups(v) => print_groups_human(&v),
        ApiResponse::ResourceIds(v) => print_resource_ids_human(&v),
        ApiResponse::Spans(v) => print_spans_human(&v),
        ApiResponse::Metrics(v) => print_metrics_human(&v),
        ApiResponse::Logs(v) => print_logs_human(&v),
        ApiResponse::Attributes(v) => print_attributes_human(&v),
        ApiResponse::Status(v) => print_status_human(&v),
        ApiResponse::Error(e) => anyhow::bail!(e),
    }
    Ok(())
}
