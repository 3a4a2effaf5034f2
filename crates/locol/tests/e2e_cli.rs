use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client;
use prost::Message;
use serial_test::serial;
use tonic::codec::CompressionEncoding;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_locol")
}

struct Server {
    child: Child,
    grpc_port: u16,
    http_port: u16,
    query_port: u16,
    uds_path: PathBuf,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_server(temp: &Path) -> Server {
    let grpc_port = free_port();
    let http_port = free_port();
    let query_port = free_port();
    let uds_path = temp.join("locol.sock");

    let child = Command::new(bin())
        .arg("run")
        .arg("--otlp-grpc-addr")
        .arg(format!("127.0.0.1:{grpc_port}"))
        .arg("--otlp-http-addr")
        .arg(format!("127.0.0.1:{http_port}"))
        .arg("--query-tcp-addr")
        .arg(format!("127.0.0.1:{query_port}"))
        .arg("--query-uds-path")
        .arg(&uds_path)
        .env("LOCOL_CONFIG", temp.join("absent.toml"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    Server {
        child,
        grpc_port,
        http_port,
        query_port,
        uds_path,
    }
}

async fn wait_http_ready(server: &mut Server) {
    let client = reqwest::Client::new();
    for _ in 0..100 {
        assert!(
            server.child.try_wait().unwrap().is_none(),
            "locol exited early"
        );
        if client
            .post(format!("http://127.0.0.1:{}/v1/logs", server.http_port))
            .body(Vec::<u8>::new())
            .send()
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("ingest endpoint not ready");
}

async fn post_protobuf(port: u16, path: &str, msg: &impl Message) {
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}{path}"))
        .header("content-type", "application/x-protobuf")
        .body(msg.encode_to_vec())
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "POST {path} -> {}", resp.status());
}

fn cli_tcp(server: &Server, args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .arg("--addr")
        .arg(format!("127.0.0.1:{}", server.query_port))
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Ingest is asynchronous; poll the CLI until `done` accepts its output.
async fn poll_cli(server: &Server, args: &[&str], done: impl Fn(&str) -> bool) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let out = stdout(&cli_tcp(server, args));
        if done(&out) {
            return out;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {args:?}: {out}");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn api_resource_id(server: &Server) -> String {
    let out = poll_cli(server, &["resources", "service.name", "api"], |out| {
        out.contains("-- 1 resources --")
    })
    .await;
    out.lines().next().unwrap().trim().to_string()
}

#[tokio::test]
#[serial]
async fn e2e_http_traces_grouped_by_service() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path());
    wait_http_ready(&mut server).await;

    post_protobuf(server.http_port, "/v1/traces", &testkit::api_trace_request()).await;

    let id = api_resource_id(&server).await;
    let spans = stdout(&cli_tcp(&server, &["spans", id.as_str()]));
    assert!(spans.contains("GET /users"));
    assert!(spans.contains("25ms"));
    assert!(spans.contains("-- 1 spans --"));

    let groups = cli_tcp(&server, &["--json", "groups"]);
    let value: serde_json::Value = serde_json::from_slice(&groups.stdout).unwrap();
    let first = &value["Groups"][0];
    assert_eq!(first["key"], "service.name");
    assert_eq!(first["value"], "api");
    assert_eq!(first["resource_ids"][0], id.as_str());
}

#[tokio::test]
#[serial]
async fn e2e_grpc_gzip_metrics_and_uds_sql() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path());
    wait_http_ready(&mut server).await;

    let endpoint = format!("http://127.0.0.1:{}", server.grpc_port);
    let mut exported = false;
    for _ in 0..50 {
        if let Ok(client) =
            metrics_service_client::MetricsServiceClient::connect(endpoint.clone()).await
        {
            let mut client = client.send_compressed(CompressionEncoding::Gzip);
            if client
                .export(tonic::Request::new(testkit::latency_metrics_request("api")))
                .await
                .is_ok()
            {
                exported = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(exported, "failed to export gRPC metrics to locol");

    let id = api_resource_id(&server).await;
    let metrics = stdout(&cli_tcp(&server, &["metrics", id.as_str()]));
    assert!(metrics.contains("http.server.latency"));
    assert!(metrics.contains("3.14"));
    assert!(metrics.contains("ms"));

    let sql = Command::new(bin())
        .arg("sql")
        .arg("SELECT metric_name, value, unit FROM metric_points")
        .arg("--uds")
        .arg(&server.uds_path)
        .output()
        .unwrap();
    assert!(sql.status.success());
    let out = stdout(&sql);
    assert!(out.starts_with("metric_name"));
    assert!(out.contains("http.server.latency  3.14"));
    assert!(out.contains("-- 1 rows --"));
}

#[tokio::test]
#[serial]
async fn e2e_logs_attributes_and_status_json() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path());
    wait_http_ready(&mut server).await;

    post_protobuf(
        server.http_port,
        "/v1/logs",
        &testkit::startup_logs_request("api"),
    )
    .await;

    let id = api_resource_id(&server).await;
    let logs = stdout(&cli_tcp(&server, &["logs", id.as_str()]));
    let starting = logs.find("starting").unwrap();
    let listening = logs.find("listening on :8080").unwrap();
    assert!(starting < listening);

    let attrs = stdout(&cli_tcp(&server, &["attributes", id.as_str()]));
    assert!(attrs.contains("service.name=api"));

    let status = cli_tcp(&server, &["--json", "status"]);
    let value: serde_json::Value = serde_json::from_slice(&status.stdout).unwrap();
    assert_eq!(value["Status"]["connected"], true);
    assert_eq!(value["Status"]["resources_count"], 1);
    assert_eq!(value["Status"]["logs_count"], 2);
}

#[tokio::test]
#[serial]
async fn e2e_query_errors_exit_non_zero() {
    let temp = tempfile::tempdir().unwrap();
    let mut server = spawn_server(temp.path());
    wait_http_ready(&mut server).await;

    let bad = cli_tcp(&server, &["sql", "SELEC nothing"]);
    assert!(!bad.status.success());
    assert!(String::from_utf8_lossy(&bad.stderr).contains("query failed"));

    let unknown = cli_tcp(&server, &["spans", "no-such-resource"]);
    assert!(unknown.status.success());
    assert!(stdout(&unknown).contains("-- 0 spans --"));
}

#[test]
fn client_without_server_fails() {
    let output = Command::new(bin())
        .arg("status")
        .arg("--addr")
        .arg("127.0.0.1:1")
        .env_remove("LOCOL_QUERY_UDS_PATH")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect query server"));
}
