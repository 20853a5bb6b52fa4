//! Line-delimited JSON control channel
//!
//! Each input line is a [`VendorRequest`]; each answer is written back as
//! one [`VendorResponse`] line in the same order. A line that is not UTF-8
//! or not a request gets a failure response; only I/O errors end the loop.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use super::{VendorApi, VendorError, VendorRequest, VendorResponse};

/// Serve requests from stdin until it closes
pub async fn serve_stdio(api: Arc<VendorApi>) -> Result<()> {
    serve_lines(api, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve requests from `reader`, answering on `writer`, until EOF
pub async fn serve_lines<R, W>(api: Arc<VendorApi>, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read request line")?;
        if read == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<VendorRequest>(line.trim()) {
                Ok(request) => dispatch(api.clone(), request).await,
                Err(e) => {
                    warn!("Rejected malformed request: {}", e);
                    api.failure("", &VendorError::InvalidRequest(e.to_string()))
                }
            },
            Err(e) => {
                warn!("Rejected request line that is not UTF-8: {}", e);
                api.failure("", &VendorError::InvalidRequest(e.to_string()))
            }
        };

        let mut encoded = serde_json::to_string(&response).context("Failed to encode response")?;
        encoded.push('\n');
        writer
            .write_all(encoded.as_bytes())
            .await
            .context("Failed to write response")?;
        writer.flush().await.context("Failed to flush response")?;
    }

    debug!("Request channel closed");
    Ok(())
}

/// Handlers touch the host synchronously, keep them off the runtime threads
async fn dispatch(api: Arc<VendorApi>, request: VendorRequest) -> VendorResponse {
    let request_type = request.request_type.clone();
    let worker_api = api.clone();
    match tokio::task::spawn_blocking(move || worker_api.handle(&request)).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Request '{}' handler failed: {}", request_type, e);
            api.failure(&request_type, &VendorError::InvalidRequest(e.to_string()))
        }
    }
}
