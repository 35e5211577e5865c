// SPDX-FileCopyrightText: 2026 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::sleep;

use tunnel_probe::config::Config;
use tunnel_probe::config_store::ConfigStore;
use tunnel_probe::engine::DirectEngine;
use tunnel_probe::probe::Prober;
use tunnel_probe::server::run_server;

/// Descriptor used by tests running against the direct engine. The engine
/// ignores the tunnel settings, so only its validity matters.
pub const CTX: &str = "trojan://secret@127.0.0.1:443?security=none";

pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of an unlabelled series, or a labelled one when `series`
    /// includes the braces.
    pub fn metric(&self, series: &str) -> Option<f64> {
        self.body
            .lines()
            .filter(|l| !l.starts_with('#'))
            .find(|l| l.starts_with(series) && l[series.len()..].starts_with(' '))
            .and_then(|l| l.rsplit(' ').next())
            .and_then(|v| v.parse().ok())
    }
}

// Start run_server with the direct engine and wait until it accepts connections
pub async fn start_server_and_wait(
    store: Arc<ConfigStore>,
) -> anyhow::Result<(tokio::task::JoinHandle<()>, SocketAddr)> {
    // Targets are plain HTTP mocks; an empty root store is enough when the
    // host has no native roots.
    let tls = tunnel_probe::client::tls_config().unwrap_or_else(|_| {
        Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(rustls::RootCertStore::empty())
                .with_no_client_auth(),
        )
    });
    let prober = Arc::new(Prober::new(store, Arc::new(DirectEngine), tls));

    // Choose a free port by binding then dropping
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let handle = tokio::spawn(async move {
        let _ = run_server(addr, prober).await;
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if Instant::now() > deadline {
            return Err(anyhow::anyhow!("timeout waiting for server to start"));
        }
        if let Ok(mut s) = tokio::net::TcpStream::connect(addr).await {
            let _ = s.shutdown().await;
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    Ok((handle, addr))
}

pub async fn start_default_server() -> anyhow::Result<(tokio::task::JoinHandle<()>, SocketAddr)> {
    start_server_and_wait(Arc::new(ConfigStore::new(Config::default()))).await
}

// Send a bare HTTP/1.1 request and read until the server closes
pub async fn raw_request(addr: SocketAddr, method: &str, path: &str) -> anyhow::Result<RawResponse> {
    let mut stream = tokio::net::TcpStream::connect(addr).await?;
    let req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await?;

    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut buf)).await??;
    parse_response(&buf)
}

pub async fn probe(addr: SocketAddr, query: &str) -> anyhow::Result<RawResponse> {
    raw_request(addr, "GET", &format!("/probe?{query}")).await
}

pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn parse_response(buf: &[u8]) -> anyhow::Result<RawResponse> {
    let text = String::from_utf8_lossy(buf);
    let (head, rest) = text
        .split_once("\r\n\r\n")
        .ok_or_else(|| anyhow::anyhow!("incomplete response"))?;
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("bad status line"))?;
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let chunked = headers.iter().any(|(k, v)| {
        k.eq_ignore_ascii_case("transfer-encoding") && v.eq_ignore_ascii_case("chunked")
    });
    let body = if chunked { dechunk(rest) } else { rest.to_string() };

    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

fn dechunk(mut rest: &str) -> String {
    let mut out = String::new();
    while let Some((size_line, tail)) = rest.split_once("\r\n") {
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap_or(0);
        if size == 0 || tail.len() < size {
            break;
        }
        out.push_str(&tail[..size]);
        rest = tail[size..].trim_start_matches("\r\n");
    }
    out
}
