use async_trait::async_trait;
use pseudo_session::InputPrompter;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;

/// Answers program input requests one line at a time; end of input declines.
pub(crate) struct LinePrompter<R, W> {
    reader: AsyncMutex<R>,
    writer: AsyncMutex<W>,
}

impl<R, W> LinePrompter<R, W> {
    pub(crate) fn new(reader: R, writer: W) -> Self {
        Self {
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
        }
    }
}

impl LinePrompter<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub(crate) fn stdio() -> Self {
        Self::new(
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

#[async_trait]
impl<R, W> InputPrompter for LinePrompter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn prompt(&self, prompt: &str) -> Option<String> {
        {
            let mut writer = self.writer.lock().await;
            let rendered = if prompt.is_empty() || prompt.ends_with(' ') {
                prompt.to_string()
            } else {
                format!("{prompt} ")
            };
            if let Err(error) = writer.write_all(rendered.as_bytes()).await {
                tracing::warn!(%error, "failed to write input prompt");
            }
            if let Err(error) = writer.flush().await {
                tracing::warn!(%error, "failed to flush input prompt");
            }
        }

        let mut line = String::new();
        match self.reader.lock().await.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(error) => {
                tracing::warn!(%error, "failed to read program input");
                None
            }
        }
    }
}
