// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Pass-through engine: dials targets directly from the probe host.
//!
//! Used for local testing and for checking the probe pipeline itself. The
//! tunnel configuration is still translated, it is just never acted on.

use super::{BoxedIo, Tunnel, TunnelEngine, TunnelError};
use crate::tunnel_config::TunnelConfig;
use async_trait::async_trait;
use tokio::net::TcpStream;

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectEngine;

impl TunnelEngine for DirectEngine {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn instantiate(&self, _config: &TunnelConfig) -> Result<Box<dyn Tunnel>, TunnelError> {
        Ok(Box::new(DirectTunnel))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectTunnel;

#[async_trait]
impl Tunnel for DirectTunnel {
    async fn start(&self) -> Result<(), TunnelError> {
        Ok(())
    }

    async fn dial(&self, host: &str, port: u16) -> std::io::Result<BoxedIo> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn resolves_locally(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<(), TunnelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dials_plain_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.expect("accept");
            s.write_all(b"hi").await.expect("write");
        });

        let tunnel = DirectEngine
            .instantiate(&crate::test_helpers::sample_tunnel_config())
            .expect("instantiate");
        tunnel.start().await.expect("start");
        let mut io = tunnel.dial("127.0.0.1", addr.port()).await.expect("dial");
        let mut buf = Vec::new();
        io.read_to_end(&mut buf).await.expect("read");
        assert_eq!(buf, b"hi");
        tunnel.close().await.expect("close");
        tunnel.close().await.expect("second close");
        server.await.expect("server");
    }
}
