//! Line-delimited JSON loop that feeds requests to [`MemoryTools`]
//!
//! Request: `{"id": 1, "tool": "memory_search", "arguments": {"query": "rust"}}`
//!
//! Response: `{"id": 1, "result": [...]}` or `{"id": 1, "error": "..."}`

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::tools::MemoryTools;

#[derive(Debug, Deserialize)]
struct ToolRequest {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

/// Answer one request line; never fails
pub fn handle_line(tools: &MemoryTools, line: &str) -> Value {
    let request: ToolRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Malformed request: {}", e);
            return json!({ "id": Value::Null, "error": format!("Malformed request: {}", e) });
        }
    };

    match tools.call(&request.tool, request.arguments) {
        Ok(result) => json!({ "id": request.id, "result": result }),
        Err(e) => {
            if e.is_caller_error() {
                tracing::warn!(tool = %request.tool, "Rejected tool call: {}", e);
            } else {
                tracing::error!(tool = %request.tool, "Tool call failed: {}", e);
            }
            json!({ "id": request.id, "error": e.to_string() })
        }
    }
}

/// Serve requests until the reader reaches EOF; returns how many were answered
pub async fn serve<R, W>(tools: &MemoryTools, reader: R, mut writer: W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(tools, &line);
        writer.write_all(response.to_string().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        answered += 1;
    }

    Ok(answered)
}
