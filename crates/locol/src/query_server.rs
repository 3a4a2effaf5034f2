use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use locol_store::Store;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};

use crate::protocol::{ApiRequest, ApiResponse};

/// What every query connection needs to answer requests.
#[derive(Clone)]
pub struct QueryContext {
    pub store: Store,
    pub primary_key: String,
}

pub async fn run_query_server(
    ctx: QueryContext,
    uds_path: PathBuf,
    tcp_addr: SocketAddr,
) -> anyhow::Result<()> {
    if let Some(parent) = uds_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("create uds parent dir")?;
    }

    if tokio::fs::metadata(&uds_path).await.is_ok() {
        let _ = tokio::fs::remove_file(&uds_path).await;
    }

    let uds_listener = UnixListener::bind(&uds_path).context("bind UDS query listener")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(&uds_path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(&uds_path, perms).await?;
    }
    let tcp_listener = TcpListener::bind(tcp_addr)
        .await
        .context("bind TCP query listener")?;
    tracing::info!(uds = %uds_path.display(), tcp = %tcp_addr, "query server listening");

    let uds_task = tokio::spawn(run_uds_loop(uds_listener, ctx.clone()));
    let tcp_task = tokio::spawn(run_tcp_loop(tcp_listener, ctx));

    tokio::select! {
        res = uds_task => {
            res??;
        }
        res = tcp_task => {
            res??;
        }
    }

    Ok(())
}

async fn run_uds_loop(listener: UnixListener, ctx: QueryContext) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), ctx).await {
                tracing::warn!(error = ?err, "uds client request failed");
            }
        });
    }
}

async fn run_tcp_loop(listener: TcpListener, ctx: QueryContext) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(BufReader::new(stream), ctx).await {
                tracing::warn!(error = ?err, "tcp client request failed");
            }
        });
    }
}

/// Answers one JSON line per request until the client hangs up.
async fn handle_stream<T>(mut stream: BufReader<T>, ctx: QueryContext) -> anyhow::Result<()>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = stream.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ApiRequest>(&line) {
            Ok(req) => handle_request(req, &ctx),
            Err(err) => ApiResponse::Error(format!("bad request: {err}")),
        };
        let payload = serde_json::to_vec(&response)?;
        stream.get_mut().write_all(&payload).await?;
        stream.get_mut().write_all(b"\n").await?;
        stream.get_mut().flush().await?;
    }
}

pub(crate) fn handle_request(req: ApiRequest, ctx: &QueryContext) -> ApiResponse {
    let store = &ctx.store;
    let resp = match req {
        ApiRequest::Query(sql) => store.execute_query(&sql).map(ApiResponse::Query),
        ApiRequest::ResourceGroups { primary_key } => store
            .resource_groups(primary_key.as_deref().unwrap_or(&ctx.primary_key))
            .map(ApiResponse::Groups),
        ApiRequest::ResourceIds { key, value } => {
            store.resource_ids(&key, &value).map(ApiResponse::ResourceIds)
        }
        ApiRequest::Spans {
            resource_ids,
            window,
        } => store
            .spans_for_resources_in(&resource_ids, &window)
            .map(ApiResponse::Spans),
        ApiRequest::Metrics {
            resource_ids,
            window,
        } => store
            .metrics_for_resources_in(&resource_ids, &window)
            .map(ApiResponse::Metrics),
        ApiRequest::Logs {
            resource_ids,
            window,
        } => store
            .logs_for_resources_in(&resource_ids, &window)
            .map(ApiResponse::Logs),
        ApiRequest::ResourceAttributes(id) => {
            store.resource_attributes(&id).map(ApiResponse::Attributes)
        }
        ApiRequest::Status => store.status().map(ApiResponse::Status),
    };

    resp.unwrap_or_else(|e| ApiResponse::Error(e.to_string()))
}
