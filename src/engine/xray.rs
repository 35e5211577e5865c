// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! External xray-core process engine.
//!
//! Each tunnel spawns `xray run` with the configuration on stdin, adds a
//! loopback SOCKS inbound on a free port, and dials through it. The child is
//! killed on close and on drop.

use super::{socks5, BoxedIo, Tunnel, TunnelEngine, TunnelError};
use crate::tunnel_config::{LogSettings, TunnelConfig};
use async_trait::async_trait;
use serde_json::json;
use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const INBOUND_TAG: &str = "probe-socks";
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct XrayEngine {
    binary: PathBuf,
    startup_timeout: Duration,
    debug: bool,
}

impl XrayEngine {
    pub fn new(binary: impl Into<PathBuf>, startup_timeout: Duration, debug: bool) -> Self {
        Self {
            binary: binary.into(),
            startup_timeout,
            debug,
        }
    }

    /// Engine document: the tunnel configuration plus the local SOCKS inbound.
    pub fn render_config(
        &self,
        config: &TunnelConfig,
        socks: SocketAddr,
    ) -> Result<serde_json::Value, TunnelError> {
        let mut config = config.clone();
        if self.debug {
            config.log = LogSettings::debug();
        }
        let mut doc = config
            .to_json()
            .map_err(|e| TunnelError::Instantiate(e.to_string()))?;
        let obj = doc.as_object_mut().ok_or_else(|| {
            TunnelError::Instantiate("tunnel configuration is not an object".to_string())
        })?;
        obj.insert(
            "inbounds".to_string(),
            json!([{
                "tag": INBOUND_TAG,
                "protocol": "socks",
                "listen": socks.ip().to_string(),
                "port": socks.port(),
                "settings": {"auth": "noauth", "udp": false}
            }]),
        );
        Ok(doc)
    }
}

impl TunnelEngine for XrayEngine {
    fn name(&self) -> &'static str {
        "xray"
    }

    fn instantiate(&self, config: &TunnelConfig) -> Result<Box<dyn Tunnel>, TunnelError> {
        let socks = free_loopback_port()?;
        let doc = self.render_config(config, socks)?;
        let payload =
            serde_json::to_vec(&doc).map_err(|e| TunnelError::Instantiate(e.to_string()))?;
        Ok(Box::new(XrayTunnel {
            binary: self.binary.clone(),
            startup_timeout: self.startup_timeout,
            debug: self.debug,
            payload,
            socks,
            child: Mutex::new(None),
        }))
    }
}

fn free_loopback_port() -> Result<SocketAddr, TunnelError> {
    let listener = StdTcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?)
}

pub struct XrayTunnel {
    binary: PathBuf,
    startup_timeout: Duration,
    debug: bool,
    payload: Vec<u8>,
    socks: SocketAddr,
    child: Mutex<Option<Child>>,
}

impl XrayTunnel {
    async fn wait_ready(&self, child: &mut Child) -> Result<(), TunnelError> {
        let deadline = Instant::now() + self.startup_timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Err(TunnelError::Start(format!("engine exited early: {status}")));
            }
            if tokio::net::TcpStream::connect(self.socks).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(TunnelError::Start(format!(
                    "engine did not open {} within {:?}",
                    self.socks, self.startup_timeout
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl Tunnel for XrayTunnel {
    async fn start(&self) -> Result<(), TunnelError> {
        let (stdout, stderr) = if self.debug {
            (Stdio::inherit(), Stdio::inherit())
        } else {
            (Stdio::null(), Stdio::null())
        };
        let mut child = Command::new(&self.binary)
            .args(["run", "-format", "json", "-config", "stdin:"])
            .stdin(Stdio::piped())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TunnelError::Start(format!("cannot spawn {}: {e}", self.binary.display()))
            })?;
        debug!(pid = ?child.id(), socks = %self.socks, "engine spawned");

        if let Some(mut stdin) = child.stdin.take() {
            // A broken pipe means the child already exited; readiness reports it.
            if let Err(e) = stdin.write_all(&self.payload).await {
                debug!(%e, "failed to write engine config");
            }
            drop(stdin);
        }

        // Keep the child reachable from close() even if readiness fails.
        let mut slot = self.child.lock().await;
        let child = slot.insert(child);
        self.wait_ready(child).await
    }

    async fn dial(&self, host: &str, port: u16) -> std::io::Result<BoxedIo> {
        let stream = socks5::connect(self.socks, host, port).await?;
        Ok(Box::new(stream))
    }

    async fn close(&self) -> Result<(), TunnelError> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if let Ok(Some(status)) = child.try_wait() {
            debug!(%status, "engine already exited");
            return Ok(());
        }
        if let Err(e) = child.kill().await {
            warn!(%e, "failed to stop engine");
            return Err(TunnelError::Close(e.to_string()));
        }
        debug!(socks = %self.socks, "engine stopped");
        Ok(())
    }
}
