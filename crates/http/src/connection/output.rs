use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::protocol::Gate;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The write half of a connection, shared by the engine and the request's [`Response`](crate::protocol::Response).
///
/// Every write first waits for the `writable` gate, so a transport reporting
/// buffer pressure suspends writers until it resumes.
#[derive(Clone)]
pub struct Output {
    inner: Arc<Inner>,
}

struct Inner {
    writer: Mutex<BoxedWriter>,
    writable: Gate,
}

impl Output {
    pub fn new<W>(writer: W, writable: Gate) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self { inner: Arc::new(Inner { writer: Mutex::new(Box::new(writer)), writable }) }
    }

    /// An output discarding everything written to it.
    pub fn sink() -> Self {
        Self::new(tokio::io::sink(), Gate::new())
    }

    pub async fn write(&self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        self.inner.writable.wait_open().await;
        let mut writer = self.inner.writer.lock().await;
        writer.write_all(data).await
    }

    pub async fn flush(&self) -> io::Result<()> {
        let mut writer = self.inner.writer.lock().await;
        writer.flush().await
    }

    pub async fn shutdown(&self) -> io::Result<()> {
        let mut writer = self.inner.writer.lock().await;
        writer.shutdown().await
    }

    pub fn writable(&self) -> &Gate {
        &self.inner.writable
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output").field("writable", &self.inner.writable.is_open()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::time::timeout;

    #[tokio::test]
    async fn write_waits_for_writable_gate() {
        let (client, server) = tokio::io::duplex(64);
        let gate = Gate::new();
        let output = Output::new(server, gate.clone());

        gate.close();
        assert!(timeout(Duration::from_millis(50), output.write(b"held")).await.is_err());

        gate.open();
        output.write(b"sent").await.unwrap();
        output.shutdown().await.unwrap();

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"sent");
    }
}
