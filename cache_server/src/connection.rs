use std::sync::Arc;

use protocol::{frame_owned, Action, RequestHeader, HEADER_LEN, MISS_RESPONSE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::registry::TableRegistry;

const DISCARD_CHUNK: usize = 4096;

/// Drives one client connection to completion. Per §4.7, at most one
/// request is in flight at a time: each iteration fully reads a request and
/// fully writes its response before the next header byte is consumed. The
/// blocking points are `.await`s on the connection's own socket, so this
/// cooperates with every other connection on the same single-threaded
/// runtime without any connection ever stalling another (§4.6).
pub async fn serve<S>(
    mut stream: S,
    registry: Arc<TableRegistry>,
    schema_json: Arc<Vec<u8>>,
    quit_signal: tokio::sync::mpsc::UnboundedSender<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let mut header_buf = [0u8; HEADER_LEN];
        if let Err(e) = stream.read_exact(&mut header_buf).await {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                debug!(error = %e, "connection read error, closing");
            }
            return;
        }

        let header = match RequestHeader::parse(&header_buf) {
            Ok(h) => h,
            Err(e) => {
                warn!(error = ?e, "protocol violation, closing connection");
                return;
            }
        };

        let discarding = header.key_len > protocol::MAX_KEY_LEN;
        let key = if discarding {
            if discard(&mut stream, header.key_len as usize).await.is_err() {
                return;
            }
            Vec::new()
        } else {
            let mut buf = vec![0u8; header.key_len as usize];
            if stream.read_exact(&mut buf).await.is_err() {
                return;
            }
            buf
        };

        let Some(action) = header.action() else {
            warn!(action_byte = header.action_byte, "unknown action byte, closing connection");
            return;
        };

        let should_close = match action {
            Action::Fetch => respond_fetch(&mut stream, &registry, &header, &key, discarding).await,
            Action::Describe => respond_framed(&mut stream, &schema_json).await,
            Action::Stats => {
                let stats_json = crate::stats::build_stats_json(&registry);
                respond_framed(&mut stream, &stats_json).await
            }
            Action::Quit => {
                let _ = respond_framed(&mut stream, br#"{"BYE":true}"#).await;
                let _ = quit_signal.send(());
                Ok(true)
            }
        };

        match should_close {
            Ok(true) => {
                info!("connection closed after quit");
                return;
            }
            Ok(false) => continue,
            Err(e) => {
                debug!(error = %e, "write error, closing connection");
                return;
            }
        }
    }
}

async fn discard<S: AsyncRead + Unpin>(stream: &mut S, mut remaining: usize) -> std::io::Result<()> {
    let mut scratch = [0u8; DISCARD_CHUNK];
    while remaining > 0 {
        let take = remaining.min(DISCARD_CHUNK);
        stream.read_exact(&mut scratch[..take]).await?;
        remaining -= take;
    }
    Ok(())
}

async fn respond_fetch<S: AsyncWrite + Unpin>(
    stream: &mut S,
    registry: &TableRegistry,
    header: &RequestHeader,
    key: &[u8],
    discarding: bool,
) -> std::io::Result<bool> {
    if discarding {
        return stream.write_all(&MISS_RESPONSE).await.map(|_| false);
    }

    let hit = registry.lookup(header.table_id).and_then(|table| {
        let snapshot = table.current_snapshot();
        let index = snapshot.indexes.get(header.index_id as usize)?;
        index.lookup(key)
    });

    match hit {
        // Safety: `table` (an `Arc<Table>` held by `registry`, itself kept
        // alive for the life of the server) guarantees the arena backing
        // this frame is not deallocated; per §9 Open Question (i) the
        // content is only at risk of being overwritten by a reload of this
        // same slot, which cannot complete before the next refresh period.
        Some(hit) => {
            let frame = unsafe { std::slice::from_raw_parts(hit.frame_ptr, hit.frame_len as usize) };
            stream.write_all(frame).await.map(|_| false)
        }
        None => stream.write_all(&MISS_RESPONSE).await.map(|_| false),
    }
}

async fn respond_framed<S: AsyncWrite + Unpin>(stream: &mut S, payload: &[u8]) -> std::io::Result<bool> {
    stream.write_all(&frame_owned(payload.to_vec())).await.map(|_| false)
}
