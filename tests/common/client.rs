//! A minimal scripted IRC client for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// One scripted connection.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// The nick this client registered under, for assertions.
    pub nick: String,
}

impl TestClient {
    /// Connect without registering.
    pub async fn connect(addr: &str, nick: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(TestClient {
            reader: BufReader::new(read_half),
            writer: write_half,
            nick: nick.to_string(),
        })
    }

    /// Send one raw line (CRLF appended).
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Read one line, stripped of its terminator.
    pub async fn recv_timeout(&mut self, wait: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(wait, self.reader.read_line(&mut line)).await??;
        anyhow::ensure!(n > 0, "connection closed");
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read lines until one satisfies `pred` (returning it) or the
    /// deadline passes.
    pub async fn wait_for(
        &mut self,
        wait: Duration,
        pred: impl Fn(&str) -> bool,
    ) -> anyhow::Result<String> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| anyhow::anyhow!("timed out waiting for line"))?;
            let line = self.recv_timeout(remaining).await?;
            if pred(&line) {
                return Ok(line);
            }
        }
    }

    /// Wait for a numeric reply with the given code.
    pub async fn expect_numeric(&mut self, code: &str) -> anyhow::Result<String> {
        let code = format!(" {code} ");
        self.wait_for(Duration::from_secs(5), |line| line.contains(&code))
            .await
    }

    /// Send NICK/USER and wait until the registration burst finishes
    /// (end of MOTD or no-MOTD).
    pub async fn register(&mut self) -> anyhow::Result<()> {
        let nick = self.nick.clone();
        self.send(&format!("NICK {nick}")).await?;
        self.send(&format!("USER {nick} 0 * :Test {nick}")).await?;
        self.wait_for(Duration::from_secs(5), |line| {
            line.contains(" 376 ") || line.contains(" 422 ")
        })
        .await?;
        Ok(())
    }

    /// Swallow anything already queued.
    pub async fn drain(&mut self) {
        while self
            .recv_timeout(Duration::from_millis(50))
            .await
            .is_ok()
        {}
    }
}
