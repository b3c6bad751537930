//! Newline-delimited JSON response sink

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::commands::CommandResponse;
use crate::traits::ResponseSink;

/// Writes each response as one JSON line
pub struct JsonLineSink<W> {
    writer: Mutex<W>,
}

pub type StdoutSink = JsonLineSink<tokio::io::Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        JsonLineSink::new(tokio::io::stdout())
    }
}

impl<W> JsonLineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_line(&self, response: &CommandResponse) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await
    }
}

#[async_trait::async_trait]
impl<W> ResponseSink for JsonLineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(&self, response: CommandResponse) {
        if let Err(e) = self.write_line(&response).await {
            tracing::error!(
                callback_id = %response.callback_id,
                error = %e,
                "Failed to write response"
            );
        }
    }
}
