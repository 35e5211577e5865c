// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Tunnel engines: turn a tunnel configuration into something that can dial.
//!
//! An engine is long-lived and shared across probes. Each probe instantiates
//! its own [`Tunnel`], starts it, dials through it and closes it. Tunnels are
//! never shared between probes.

pub mod direct;
pub mod socks5;
pub mod xray;

use crate::tunnel_config::TunnelConfig;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

pub use direct::DirectEngine;
pub use xray::XrayEngine;

/// Byte stream returned by [`Tunnel::dial`].
pub trait TunnelIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> TunnelIo for T {}

pub type BoxedIo = Box<dyn TunnelIo>;

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("failed to instantiate tunnel: {0}")]
    Instantiate(String),
    #[error("failed to start tunnel: {0}")]
    Start(String),
    #[error("failed to close tunnel: {0}")]
    Close(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait TunnelEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn instantiate(&self, config: &TunnelConfig) -> Result<Box<dyn Tunnel>, TunnelError>;
}

#[async_trait]
pub trait Tunnel: Send + Sync {
    async fn start(&self) -> Result<(), TunnelError>;

    /// Open a stream to `host:port` through the tunnel.
    async fn dial(&self, host: &str, port: u16) -> std::io::Result<BoxedIo>;

    /// Whether the caller should resolve hostnames before dialling. Tunnels
    /// that resolve remotely leave the resolve phase empty.
    fn resolves_locally(&self) -> bool {
        false
    }

    /// Release every resource held by the tunnel. Safe to call more than
    /// once and after a failed start.
    async fn close(&self) -> Result<(), TunnelError>;
}
