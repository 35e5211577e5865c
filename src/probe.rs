// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Probe orchestration: descriptor to tunnel to request to verdict to metrics.
//!
//! Request and translation problems are returned as errors before any tunnel
//! exists. Once a tunnel has been instantiated it is closed on every path.
//! Network failures during the exchange are not errors: they are reported
//! as `tun_probe_success 0` in the rendered metrics.

use crate::auth::AuthStrategy;
use crate::client::{ClientRequest, ClientResponse, ProbeClient};
use crate::config::{HttpConfig, ScopeConfig, DEFAULT_SCOPE};
use crate::config_store::ConfigStore;
use crate::descriptor::ConnectionDescriptor;
use crate::engine::{Tunnel, TunnelEngine, TunnelError};
use crate::metrics::ProbeMetrics;
use crate::rules::{self, ResponseView};
use crate::trace::{self, TraceLog};
use crate::translate::{self, TranslateError};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCEPT, USER_AGENT};
use hyper::{HeaderMap, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{0}")]
    Request(String),
    #[error("unable to translate connection descriptor: {0}")]
    Translation(#[from] TranslateError),
    #[error("tunnel engine failure: {0}")]
    Tunnel(#[from] TunnelError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProbeError::Request(_) | ProbeError::Translation(_) => StatusCode::BAD_REQUEST,
            ProbeError::Tunnel(_) | ProbeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<prometheus::Error> for ProbeError {
    fn from(e: prometheus::Error) -> Self {
        ProbeError::Internal(format!("metrics: {e}"))
    }
}

/// Query parameters of one probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeParams {
    pub connection: String,
    pub target: String,
    pub scope: Option<String>,
    pub timeout: Option<Duration>,
    pub max_redirects: Option<usize>,
}

impl ProbeParams {
    pub fn from_query(query: Option<&str>) -> Result<Self, ProbeError> {
        let mut connection = None;
        let mut target = None;
        let mut scope = None;
        let mut timeout = None;
        let mut max_redirects = None;

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "ctx" if connection.is_none() => connection = Some(value.into_owned()),
                "target" if target.is_none() => target = Some(value.into_owned()),
                "scope" if scope.is_none() => scope = Some(value.into_owned()),
                "timeout" if timeout.is_none() => {
                    let parsed = crate::serde_helpers::duration::parse(&value)
                        .map_err(|e| ProbeError::Request(format!("query-param 'timeout': {e}")))?;
                    timeout = Some(parsed);
                }
                "max_redirects" if max_redirects.is_none() => {
                    let parsed = value.trim().parse::<usize>().map_err(|_| {
                        ProbeError::Request(format!(
                            "query-param 'max_redirects' must be a non-negative integer, got '{value}'"
                        ))
                    })?;
                    max_redirects = Some(parsed);
                }
                _ => {}
            }
        }

        let connection = connection
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ProbeError::Request("VPN connection query-param 'ctx' is missing".into()))?;
        let target = target
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProbeError::Request("Target query-param is missing".into()))?;

        Ok(Self {
            connection,
            target: normalize_target(&target),
            scope: scope.filter(|s| !s.is_empty()),
            timeout,
            max_redirects,
        })
    }

    /// Descriptor scheme for logging, without parsing the rest.
    pub fn scheme(&self) -> &str {
        self.connection
            .split_once("://")
            .map(|(s, _)| s)
            .filter(|s| !s.is_empty())
            .unwrap_or("<empty>")
    }

    pub fn scope_name(&self) -> &str {
        self.scope.as_deref().unwrap_or(DEFAULT_SCOPE)
    }
}

fn normalize_target(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("http://{target}")
    }
}

pub struct Prober {
    config: Arc<ConfigStore>,
    engine: Arc<dyn TunnelEngine>,
    tls: Arc<rustls::ClientConfig>,
    user_agent: HeaderValue,
}

impl Prober {
    pub fn new(
        config: Arc<ConfigStore>,
        engine: Arc<dyn TunnelEngine>,
        tls: Arc<rustls::ClientConfig>,
    ) -> Self {
        Self {
            config,
            engine,
            tls,
            user_agent: HeaderValue::from_static(concat!("tunnel-probe/", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Run one probe and return the rendered metrics.
    pub async fn probe(&self, params: ProbeParams) -> Result<String, ProbeError> {
        let span = info_span!(
            "probe",
            scheme = %params.scheme(),
            target = %params.target,
            scope = %params.scope_name(),
        );
        async move {
            let started = Instant::now();
            let outcome = self.run(params).await;
            let elapsed = started.elapsed();
            match &outcome {
                Ok(_) => info!(?elapsed, "probe finished"),
                Err(e) => {
                    info!(?elapsed, error = %e, status = %e.status(), "probe finished with error")
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, params: ProbeParams) -> Result<String, ProbeError> {
        // Held for the whole probe so a reload never mixes scope fields.
        let snapshot = self.config.snapshot();
        let scope = snapshot.scope(params.scope.as_deref()).ok_or_else(|| {
            ProbeError::Request(format!(
                "Scope '{}' does not exist in configuration",
                params.scope_name()
            ))
        })?;
        let target = Url::parse(&params.target)
            .map_err(|e| ProbeError::Request(format!("invalid target '{}': {}", params.target, e)))?;

        let descriptor = ConnectionDescriptor::parse(&params.connection).inspect_err(|e| {
            warn!(%e, "rejecting connection descriptor");
        })?;
        let tunnel_config = translate::translate(&descriptor).inspect_err(|e| {
            warn!(%e, "rejecting connection descriptor");
        })?;

        let timeout = params.timeout.unwrap_or(scope.timeout);
        let max_redirects = params.max_redirects.unwrap_or(scope.http.max_redirects);
        info!(
            ?timeout,
            method = %scope.http.method,
            max_redirects,
            engine = self.engine.name(),
            "received probe"
        );

        let metrics = ProbeMetrics::new(&scope.http.fail_if)?;

        let tunnel = self.engine.instantiate(&tunnel_config).inspect_err(|e| {
            error!(%e, "failed to instantiate tunnel");
        })?;
        if let Err(e) = tunnel.start().await {
            error!(%e, "failed to start tunnel");
            close_tunnel(tunnel.as_ref()).await;
            return Err(e.into());
        }

        let outcome = self
            .exchange(tunnel.as_ref(), scope, target, timeout, max_redirects, &metrics)
            .await;
        close_tunnel(tunnel.as_ref()).await;
        outcome?;

        Ok(metrics.render()?)
    }

    async fn exchange(
        &self,
        tunnel: &dyn Tunnel,
        scope: &ScopeConfig,
        target: Url,
        timeout: Duration,
        max_redirects: usize,
        metrics: &ProbeMetrics,
    ) -> Result<(), ProbeError> {
        let http = &scope.http;
        let trace = TraceLog::new();
        let mut client = ProbeClient::new(tunnel, trace.clone(), self.tls.clone(), max_redirects);

        let request = match self.build_request(http, target).await {
            Ok(request) => request,
            Err(e) => {
                error!(%e, "failed to prepare request");
                metrics.set_success(false);
                return Ok(());
            }
        };

        let deadline = Instant::now() + timeout;
        let response = match tokio::time::timeout_at(deadline, client.send(request)).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                warn!(%e, "probe failed");
                None
            }
            Err(_) => {
                warn!(?timeout, "probe timed out");
                None
            }
        };
        metrics.set_redirects(client.redirects());

        let success = match response {
            Some(response) => self.conclude(response, http, deadline, &trace, metrics).await?,
            None => false,
        };
        metrics.set_success(success);

        let traces = trace.snapshot();
        info!(count = traces.len(), "round trips traced");
        for (i, t) in traces.iter().enumerate() {
            debug!(
                round_trip = i,
                tls = t.used_tls,
                init = ?t.init,
                dns_done = ?t.dns_done,
                connect_done = ?t.connect_done,
                got_connection = ?t.got_connection,
                first_byte = ?t.first_byte,
                tls_start = ?t.tls_start,
                tls_done = ?t.tls_done,
                exit = ?t.exit,
                "trace"
            );
        }
        metrics.set_phases(&trace::aggregate(&traces));
        if let Some(elapsed) = trace::elapsed(&traces) {
            metrics.set_duration(elapsed);
        }
        Ok(())
    }

    /// Consume the body, run the fail-if rules and record response gauges.
    async fn conclude(
        &self,
        response: ClientResponse,
        http: &HttpConfig,
        deadline: Instant,
        trace: &TraceLog,
        metrics: &ProbeMetrics,
    ) -> Result<bool, ProbeError> {
        let content_length = response.content_length();
        let ClientResponse {
            status,
            headers,
            body,
            url,
            method,
            used_tls,
        } = response;

        let keep = rules::needs_body(&http.fail_if);
        let consumed = consume_body(body, keep, deadline).await;
        trace.finish();

        let (kept, body_len, read_ok) = match consumed {
            Ok((kept, n)) => (kept, n, true),
            Err((n, e)) => {
                error!(%e, "failed to read response body");
                (None, n, false)
            }
        };

        let verdict_ok = if read_ok {
            let view = ResponseView {
                status: status.as_u16(),
                headers: &headers,
                body: kept.as_deref(),
                used_tls,
            };
            let verdict = rules::evaluate(&view, &http.fail_if);
            if let Some((idx, module)) = verdict.failed {
                info!(rule = idx, %module, "fail_if rule failed the probe, skipping the rest");
                metrics.mark_failed(module);
            }
            verdict.success
        } else {
            false
        };

        metrics.set_status_code(status.as_u16())?;
        metrics.set_content_length(content_length);
        metrics.set_body_length(body_len);
        metrics.set_ssl(used_tls);

        let success = read_ok && verdict_ok;
        info!(
            success,
            final_url = %url,
            %method,
            %status,
            content_length = ?content_length,
            body_length = body_len,
            "response evaluated"
        );
        Ok(success)
    }

    async fn build_request(&self, http: &HttpConfig, url: Url) -> anyhow::Result<ClientRequest> {
        let body = if let Some(path) = &http.body_file {
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| anyhow::anyhow!("cannot read body file {}: {}", path.display(), e))?;
            Bytes::from(data)
        } else {
            Bytes::from(http.body.clone().unwrap_or_default())
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        for (name, value) in &http.headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(strategy) = http.auth.strategy() {
            apply_auth(strategy.as_ref(), &mut headers)?;
        }

        Ok(ClientRequest {
            method: http.method.clone(),
            url,
            headers,
            body,
        })
    }
}

fn apply_auth(strategy: &dyn AuthStrategy, headers: &mut HeaderMap) -> anyhow::Result<()> {
    strategy
        .issue(headers)
        .map_err(|e| anyhow::anyhow!("auth.{}: {}", strategy.name(), e))
}

async fn close_tunnel(tunnel: &dyn Tunnel) {
    if let Err(e) = tunnel.close().await {
        error!(%e, "failed to close tunnel");
    }
}

/// Read the body to the end, keeping it only when asked. Returns the kept
/// bytes and the byte count, or the count so far and the error.
async fn consume_body(
    mut body: Incoming,
    keep: bool,
    deadline: Instant,
) -> Result<(Option<Vec<u8>>, u64), (u64, String)> {
    let mut kept = keep.then(Vec::new);
    let mut count = 0u64;
    loop {
        let frame = match tokio::time::timeout_at(deadline, body.frame()).await {
            Err(_) => return Err((count, "timed out reading body".to_string())),
            Ok(None) => break,
            Ok(Some(Err(e))) => return Err((count, e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };
        if let Ok(data) = frame.into_data() {
            count += data.len() as u64;
            if let Some(buf) = kept.as_mut() {
                buf.extend_from_slice(&data);
            }
        }
    }
    Ok((kept, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_helpers::{CapturedLogs, CountingEngine};
    use rstest::rstest;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CTX: &str = "trojan://secret@127.0.0.1:443?security=none";

    fn tls() -> Arc<rustls::ClientConfig> {
        crate::client::tls_config().unwrap_or_else(|_| {
            Arc::new(
                rustls::ClientConfig::builder()
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth(),
            )
        })
    }

    fn prober(toml: &str, engine: CountingEngine) -> Prober {
        let cfg = Config::from_toml_str(toml).expect("config");
        Prober::new(Arc::new(ConfigStore::new(cfg)), Arc::new(engine), tls())
    }

    fn params(target: String) -> ProbeParams {
        ProbeParams {
            connection: CTX.to_string(),
            target,
            scope: None,
            timeout: None,
            max_redirects: None,
        }
    }

    fn gauge(text: &str, series: &str) -> Option<f64> {
        text.lines()
            .find(|l| l.starts_with(series) && l[series.len()..].starts_with(' '))
            .and_then(|l| l.rsplit(' ').next())
            .and_then(|v| v.parse().ok())
    }

    #[test]
    fn params_require_ctx_and_target() {
        let err = ProbeParams::from_query(Some("target=example.com")).expect_err("ctx");
        assert!(err.to_string().contains("'ctx'"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = ProbeParams::from_query(Some("ctx=vless%3A%2F%2Fx")).expect_err("target");
        assert!(err.to_string().contains("Target"));
        assert!(ProbeParams::from_query(None).is_err());
    }

    #[rstest]
    #[case("example.com", "http://example.com")]
    #[case("http://example.com/a", "http://example.com/a")]
    #[case("https://example.com", "https://example.com")]
    fn params_normalize_target(#[case] raw: &str, #[case] expected: &str) {
        let q = format!(
            "ctx={}&target={}",
            url::form_urlencoded::byte_serialize(CTX.as_bytes()).collect::<String>(),
            url::form_urlencoded::byte_serialize(raw.as_bytes()).collect::<String>()
        );
        let p = ProbeParams::from_query(Some(&q)).expect("params");
        assert_eq!(p.target, expected);
        assert_eq!(p.scheme(), "trojan");
        assert_eq!(p.scope_name(), DEFAULT_SCOPE);
    }

    #[test]
    fn params_parse_overrides() {
        let p = ProbeParams::from_query(Some(
            "ctx=ss%3A%2F%2Fx&target=a&scope=api&timeout=2s&max_redirects=0",
        ))
        .expect("params");
        assert_eq!(p.scope.as_deref(), Some("api"));
        assert_eq!(p.timeout, Some(Duration::from_secs(2)));
        assert_eq!(p.max_redirects, Some(0));

        let err = ProbeParams::from_query(Some("ctx=a&target=b&max_redirects=-1"))
            .expect_err("negative");
        assert!(err.to_string().contains("max_redirects"));
    }

    #[tokio::test]
    async fn successful_probe_renders_metrics_and_closes_tunnel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("accept", "*/*"))
            .and(header("x-probe", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let engine = CountingEngine::default();
        let lifecycle = engine.lifecycle.clone();
        let p = prober(
            "[scopes.default.http]\nheaders = { \"X-Probe\" = \"1\" }\n[[scopes.default.http.fail_if]]\nmodule = \"body_regex\"\nvalue = \"hello\"\ninvert = true\n",
            engine,
        );
        let text = p.probe(params(server.uri())).await.expect("probe");

        assert_eq!(gauge(&text, "tun_probe_success"), Some(1.0));
        assert_eq!(gauge(&text, "tun_probe_http_status_code"), Some(200.0));
        assert_eq!(gauge(&text, "tun_probe_http_uncompressed_body_length_bytes"), Some(5.0));
        assert_eq!(gauge(&text, "tun_probe_http_content_length_bytes"), Some(5.0));
        assert_eq!(gauge(&text, "tun_probe_failed_due_to_regex_body"), Some(0.0));
        assert_eq!(gauge(&text, "tun_probe_http_ssl"), Some(0.0));
        assert!(gauge(&text, "tun_probe_duration_seconds").unwrap_or(-1.0) >= 0.0);
        assert_eq!(lifecycle.started(), 1);
        assert_eq!(lifecycle.closed(), 1);
    }

    #[tokio::test]
    async fn missing_content_length_is_reported_as_unknown() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let p = prober("", CountingEngine::default());
        let text = p.probe(params(server.uri())).await.expect("probe");

        assert_eq!(gauge(&text, "tun_probe_http_status_code"), Some(204.0));
        assert_eq!(gauge(&text, "tun_probe_http_content_length_bytes"), Some(-1.0));
        assert_eq!(gauge(&text, "tun_probe_http_uncompressed_body_length_bytes"), Some(0.0));
    }

    #[tokio::test]
    async fn completion_is_logged_on_every_exit() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        prober("", CountingEngine::default())
            .probe(params(server.uri()))
            .await
            .expect("probe");
        let mut unknown = params(server.uri());
        unknown.scope = Some("nope".to_string());
        assert!(prober("", CountingEngine::default()).probe(unknown).await.is_err());
        assert!(prober("", CountingEngine::failing_start())
            .probe(params(server.uri()))
            .await
            .is_err());

        let text = logs.text();
        let finished: Vec<&str> = text.lines().filter(|l| l.contains("probe finished")).collect();
        assert_eq!(finished.len(), 3, "{text}");
        assert!(!finished[0].contains("with error"));
        assert!(finished[1].contains("Scope 'nope' does not exist"));
        assert!(finished[1].contains("status=400"));
        assert!(finished[2].contains("status=500"));
    }

    #[tokio::test]
    async fn failing_rule_sets_its_gauge() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let p = prober(
            "[[scopes.default.http.fail_if]]\nmodule = \"status_code_set\"\nvalue = \"500-599\"\n[[scopes.default.http.fail_if]]\nmodule = \"ssl\"\ninvert = true\n",
            CountingEngine::default(),
        );
        let text = p.probe(params(server.uri())).await.expect("probe");
        assert_eq!(gauge(&text, "tun_probe_success"), Some(0.0));
        assert_eq!(gauge(&text, "tun_probe_failed_due_to_status"), Some(1.0));
        assert_eq!(gauge(&text, "tun_probe_failed_due_to_ssl"), Some(0.0));
        assert_eq!(gauge(&text, "tun_probe_http_status_code"), Some(503.0));
    }

    #[tokio::test]
    async fn network_failure_is_a_failed_probe_not_an_error() {
        let l = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = l.local_addr().expect("addr");
        drop(l);

        let engine = CountingEngine::default();
        let lifecycle = engine.lifecycle.clone();
        let p = prober("", engine);
        let text = p
            .probe(params(format!("http://{addr}/")))
            .await
            .expect("probe");
        assert_eq!(gauge(&text, "tun_probe_success"), Some(0.0));
        assert_eq!(gauge(&text, "tun_probe_duration_seconds"), Some(0.0));
        assert!(!text.contains("tun_probe_http_status_code"));
        assert_eq!(lifecycle.closed(), 1);
    }

    #[tokio::test]
    async fn timeout_fails_probe() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let engine = CountingEngine::default();
        let lifecycle = engine.lifecycle.clone();
        let p = prober("[scopes.default]\ntimeout = \"200ms\"\n", engine);
        let text = p.probe(params(server.uri())).await.expect("probe");
        assert_eq!(gauge(&text, "tun_probe_success"), Some(0.0));
        assert_eq!(lifecycle.closed(), 1);
    }

    #[tokio::test]
    async fn missing_body_file_fails_probe() {
        let server = MockServer::start().await;
        let engine = CountingEngine::default();
        let lifecycle = engine.lifecycle.clone();
        let p = prober(
            "[scopes.default.http]\nmethod = \"POST\"\nbody_file = \"/nonexistent/tunnel-probe-body\"\n",
            engine,
        );
        let text = p.probe(params(server.uri())).await.expect("probe");
        assert_eq!(gauge(&text, "tun_probe_success"), Some(0.0));
        assert_eq!(lifecycle.closed(), 1);
    }

    #[tokio::test]
    async fn unknown_scope_is_a_request_error() {
        let engine = CountingEngine::default();
        let lifecycle = engine.lifecycle.clone();
        let p = prober("", engine);
        let mut prm = params("http://127.0.0.1:1/".to_string());
        prm.scope = Some("nope".to_string());
        let err = p.probe(prm).await.expect_err("must fail");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("'nope'"));
        assert_eq!(lifecycle.instantiated.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bad_descriptor_never_starts_tunnel() {
        let engine = CountingEngine::default();
        let lifecycle = engine.lifecycle.clone();
        let p = prober("", engine);
        let mut prm = params("http://127.0.0.1:1/".to_string());
        prm.connection = "gopher://x@y:1".to_string();
        let err = p.probe(prm).await.expect_err("must fail");
        assert!(matches!(err, ProbeError::Translation(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(lifecycle.started(), 0);
    }

    #[tokio::test]
    async fn start_failure_still_closes_tunnel() {
        let engine = CountingEngine::failing_start();
        let lifecycle = engine.lifecycle.clone();
        let p = prober("", engine);
        let err = p
            .probe(params("http://127.0.0.1:1/".to_string()))
            .await
            .expect_err("must fail");
        assert!(matches!(err, ProbeError::Tunnel(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(lifecycle.started(), 1);
        assert_eq!(lifecycle.closed(), 1);
    }

    #[tokio::test]
    async fn auth_header_is_applied_last() {
        let server = MockServer::start().await;
        Mock::given(header("authorization", "Basic dTpw"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(401))
            .with_priority(10)
            .mount(&server)
            .await;

        let p = prober(
            "[scopes.default.http]\nheaders = { Authorization = \"Bearer stale\" }\n[scopes.default.http.auth.basic]\nid = \"u\"\npassword = \"p\"\n[[scopes.default.http.fail_if]]\nmodule = \"status_code_set\"\nvalue = \"401\"\n",
            CountingEngine::default(),
        );
        let text = p.probe(params(server.uri())).await.expect("probe");
        assert_eq!(gauge(&text, "tun_probe_http_status_code"), Some(200.0));
        assert_eq!(gauge(&text, "tun_probe_success"), Some(1.0));
    }

    #[tokio::test]
    async fn request_override_of_redirect_cap() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/next"))
            .mount(&server)
            .await;
        Mock::given(path("/next"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let p = prober("", CountingEngine::default());
        let mut prm = params(server.uri());
        prm.max_redirects = Some(0);
        let text = p.probe(prm).await.expect("probe");
        assert_eq!(gauge(&text, "tun_probe_http_status_code"), Some(302.0));
        assert_eq!(gauge(&text, "tun_probe_http_redirects"), Some(0.0));

        let text = p.probe(params(server.uri())).await.expect("probe");
        assert_eq!(gauge(&text, "tun_probe_http_status_code"), Some(200.0));
        assert_eq!(gauge(&text, "tun_probe_http_redirects"), Some(1.0));
    }
}
