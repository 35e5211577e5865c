// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Shared test utilities to reduce duplication across test modules.

use crate::engine::{BoxedIo, DirectEngine, Tunnel, TunnelEngine, TunnelError};
use crate::rules::{FailIfModule, FailIfRule, ResponseView};
use crate::tunnel_config::TunnelConfig;
use async_trait::async_trait;
use hyper::HeaderMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A translated trojan-over-TLS configuration.
pub fn sample_tunnel_config() -> TunnelConfig {
    crate::translate::translate_str("trojan://secret@example.com:443?security=tls&sni=example.com")
        .expect("sample descriptor translates")
}

pub fn fail_if(module: FailIfModule, value: &str, invert: bool) -> FailIfRule {
    FailIfRule::new(module, value, invert)
}

pub fn response_view<'a>(
    status: u16,
    headers: &'a HeaderMap,
    body: Option<&'a [u8]>,
    used_tls: bool,
) -> ResponseView<'a> {
    ResponseView {
        status,
        headers,
        body,
        used_tls,
    }
}

/// Build a header map from name/value pairs.
pub fn make_headers_from_pairs(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (k, v) in pairs {
        headers.append(
            hyper::header::HeaderName::from_bytes(k.as_bytes()).expect("header name"),
            hyper::header::HeaderValue::from_str(v).expect("header value"),
        );
    }
    headers
}

/// Lifecycle counters shared by a [`CountingEngine`] and its tunnels.
#[derive(Debug, Default)]
pub struct Lifecycle {
    pub instantiated: AtomicUsize,
    pub started: AtomicUsize,
    pub closed: AtomicUsize,
}

impl Lifecycle {
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

/// Direct engine that records every lifecycle call and can be told to fail
/// on start.
#[derive(Debug, Default, Clone)]
pub struct CountingEngine {
    pub lifecycle: Arc<Lifecycle>,
    pub fail_start: bool,
}

impl CountingEngine {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }
}

impl TunnelEngine for CountingEngine {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn instantiate(&self, config: &TunnelConfig) -> Result<Box<dyn Tunnel>, TunnelError> {
        self.lifecycle.instantiated.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingTunnel {
            inner: DirectEngine.instantiate(config)?,
            lifecycle: self.lifecycle.clone(),
            fail_start: self.fail_start,
        }))
    }
}

struct CountingTunnel {
    inner: Box<dyn Tunnel>,
    lifecycle: Arc<Lifecycle>,
    fail_start: bool,
}

#[async_trait]
impl Tunnel for CountingTunnel {
    async fn start(&self) -> Result<(), TunnelError> {
        self.lifecycle.started.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(TunnelError::Start("refused by test engine".to_string()));
        }
        self.inner.start().await
    }

    async fn dial(&self, host: &str, port: u16) -> std::io::Result<BoxedIo> {
        self.inner.dial(host, port).await
    }

    fn resolves_locally(&self) -> bool {
        self.inner.resolves_locally()
    }

    async fn close(&self) -> Result<(), TunnelError> {
        self.lifecycle.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Log output captured from a thread-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a subscriber for the current thread. Logs are captured until
    /// the returned guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
