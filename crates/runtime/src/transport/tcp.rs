//! Newline-delimited JSON over TCP.
//!
//! Each line the client sends is one control message; each line the server
//! writes is one [`Event`].
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::{ControlReader, EventWriter, run_session};
use crate::api::TransportError;
use crate::events::Event;
use crate::runtime::Runtime;

pub struct JsonLinesWriter<W> {
    inner: W,
}

impl<W> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> EventWriter for JsonLinesWriter<W> {
    async fn send(&mut self, event: &Event) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.inner.write_all(&line).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

pub struct JsonLinesReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> JsonLinesReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            lines: BufReader::new(inner).lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ControlReader for JsonLinesReader<R> {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(line) = self.lines.next_line().await? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

/// Accepts connections forever, one session per connection.
pub async fn serve(listener: TcpListener, runtime: Runtime) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "arena listening");
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "failed to accept connection");
                continue;
            }
        };

        let runtime = runtime.clone();
        tokio::spawn(async move {
            let (read, write) = stream.into_split();
            let mut reader = JsonLinesReader::new(read);
            let mut writer = JsonLinesWriter::new(write);
            match run_session(&runtime, &mut writer, &mut reader).await {
                Ok(report) => info!(
                    %peer,
                    match_id = %report.match_id,
                    status = %report.status,
                    "session finished"
                ),
                Err(TransportError::Disconnected) => info!(%peer, "client closed session"),
                Err(err) => error!(%peer, error = %err, "session failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn writes_one_event_per_line() {
        let (client, server) = duplex(1024);
        let mut writer = JsonLinesWriter::new(server);
        writer.send(&Event::error("first")).await.unwrap();
        writer.send(&Event::error("second")).await.unwrap();
        writer.close().await.unwrap();

        let mut reader = JsonLinesReader::new(client);
        let first = reader.recv().await.unwrap().unwrap();
        assert_eq!(first, r#"{"type":"error","message":"first"}"#);
        assert!(reader.recv().await.unwrap().unwrap().contains("second"));
        assert_eq!(reader.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reader_skips_blank_lines() {
        let (mut client, server) = duplex(1024);
        client.write_all(b"\n  \n{\"type\":\"start_match\"}\n").await.unwrap();
        drop(client);

        let mut reader = JsonLinesReader::new(server);
        assert_eq!(
            reader.recv().await.unwrap().as_deref(),
            Some(r#"{"type":"start_match"}"#)
        );
        assert_eq!(reader.recv().await.unwrap(), None);
    }
}
