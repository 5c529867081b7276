//! Test server management: spawns and manages emberd instances.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::sleep;

/// A spawned emberd instance bound to a per-test port.
pub struct TestServer {
    child: Child,
    port: u16,
    data_dir: PathBuf,
}

impl TestServer {
    /// Spawn a server on `port` with a minimal config. `extra_config` is
    /// appended verbatim for tests that need operators, limits, etc.
    pub async fn spawn(port: u16, extra_config: &str) -> anyhow::Result<Self> {
        let data_dir = std::env::temp_dir().join(format!("emberd-test-{port}"));
        std::fs::create_dir_all(&data_dir)?;

        let motd_path = data_dir.join("motd.txt");
        std::fs::write(&motd_path, "Welcome to the test network\n")?;

        let config_path = data_dir.join("emberd.toml");
        let config_content = format!(
            r#"
[server]
name = "irc.test.example"
network = "TestNet"
sid = "00T"
description = "Test IRC Server"
listen = "127.0.0.1:{port}"

[limits]
ping_interval_secs = 300

[files]
motd_path = "{motd}"

{extra_config}
"#,
            motd = motd_path.display(),
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_emberd"))
            .arg("--config")
            .arg(&config_path)
            .arg("--nolog")
            .arg("--runasroot")
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        let server = TestServer {
            child,
            port,
            data_dir,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// The address clients should connect to.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..100 {
            if TcpStream::connect(self.address()).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server on port {} never came up", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
