use std::sync::Arc;
use std::time::Duration;

use common::err::CacheError;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::config::ListenConfig;
use crate::registry::TableRegistry;

/// Delay before retrying `accept()` after a failure, so a persistent error
/// (e.g. hitting the open-file-descriptor limit) doesn't spin the loop at
/// full CPU.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Binds whichever endpoints are configured (§4.9) and spawns one `serve`
/// task per accepted connection on the current-thread runtime.
pub async fn spawn_accept_loops(
    listen: &ListenConfig,
    registry: Arc<TableRegistry>,
    schema_json: Arc<Vec<u8>>,
    quit_signal: UnboundedSender<()>,
) -> Result<(), CacheError> {
    let mut any = false;

    if let Some(path) = &listen.unix_socket_path {
        let _ = std::fs::remove_file(path);
        let unix_listener = UnixListener::bind(path).map_err(CacheError::Io)?;
        set_unix_socket_mode(path)?;
        info!(path, "listening on unix socket");
        tokio::task::spawn_local(accept_unix(unix_listener, registry.clone(), schema_json.clone(), quit_signal.clone()));
        any = true;
    }

    if listen.tcp_port != 0 {
        let host = listen.tcp_host.clone().unwrap_or_else(|| "127.0.0.1".to_string());
        let addr = format!("{host}:{}", listen.tcp_port);
        let tcp_listener = TcpListener::bind(&addr).await.map_err(CacheError::Io)?;
        info!(addr, "listening on tcp");
        tokio::task::spawn_local(accept_tcp(tcp_listener, registry, schema_json, quit_signal));
        any = true;
    }

    if !any {
        return Err(CacheError::Config("no listener configured (unix socket and tcp both disabled)".into()));
    }
    Ok(())
}

async fn accept_unix(
    listener: UnixListener,
    registry: Arc<TableRegistry>,
    schema_json: Arc<Vec<u8>>,
    quit_signal: UnboundedSender<()>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let registry = registry.clone();
                let schema_json = schema_json.clone();
                let quit_signal = quit_signal.clone();
                tokio::task::spawn_local(async move {
                    crate::connection::serve(stream, registry, schema_json, quit_signal).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "unix accept failed, backing off");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

async fn accept_tcp(
    listener: TcpListener,
    registry: Arc<TableRegistry>,
    schema_json: Arc<Vec<u8>>,
    quit_signal: UnboundedSender<()>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let _ = stream.set_nodelay(true);
                let registry = registry.clone();
                let schema_json = schema_json.clone();
                let quit_signal = quit_signal.clone();
                tokio::task::spawn_local(async move {
                    crate::connection::serve(stream, registry, schema_json, quit_signal).await;
                });
            }
            Err(e) => {
                warn!(error = %e, "tcp accept failed, backing off");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(unix)]
fn set_unix_socket_mode(path: &str) -> Result<(), CacheError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o660);
    std::fs::set_permissions(path, perms).map_err(CacheError::Io)
}

#[cfg(not(unix))]
fn set_unix_socket_mode(_path: &str) -> Result<(), CacheError> {
    Ok(())
}
