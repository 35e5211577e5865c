// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! HTTP listener exposing `GET /probe`.

use crate::probe::{ProbeError, ProbeParams, Prober};
use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ALLOW, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use hyper::{service::service_fn, Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoConnBuilder;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{error, info};

type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>, Infallible>> + Send>>;

const PROBE_PATH: &str = "/probe";

pub async fn run_server(listen: SocketAddr, prober: Arc<Prober>) -> anyhow::Result<()> {
    run_server_with_limit(listen, prober, None).await
}

/// Testable variant of `run_server` that accepts an optional `accept_limit`.
/// When `accept_limit` is `Some(n)`, the accept loop returns after accepting
/// the Nth connection. Connection handlers keep running in their own tasks.
pub async fn run_server_with_limit(
    listen: SocketAddr,
    prober: Arc<Prober>,
    accept_limit: Option<usize>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(%listen, "listening");

    let server_builder = AutoConnBuilder::new(TokioExecutor::new());

    let mut remaining = accept_limit;
    loop {
        if let Some(0) = remaining {
            break;
        }

        let (stream, remote_addr) = listener.accept().await?;

        if let Some(ref mut n) = remaining {
            *n -= 1;
        }

        let prober = prober.clone();
        let builder_clone = server_builder.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let prober = prober.clone();
                let fut: ServiceFuture = Box::pin(async move { handle_request(req, prober).await });
                fut
            });

            let io = TokioIo::new(stream);
            if let Err(e) = builder_clone.serve_connection(io, service).await {
                error!(%e, %remote_addr, "connection error");
            }
        });
    }

    Ok(())
}

async fn handle_request<B>(
    req: Request<B>,
    prober: Arc<Prober>,
) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
    if req.uri().path() != PROBE_PATH {
        return Ok(text_response(StatusCode::NOT_FOUND, "404 page not found".into()));
    }

    let mut response = if req.method() == Method::GET {
        let outcome = match ProbeParams::from_query(req.uri().query()) {
            // Detached so the tunnel is still closed when the client goes away.
            Ok(params) => tokio::spawn(async move { prober.probe(params).await })
                .await
                .unwrap_or_else(|e| Err(ProbeError::Internal(format!("probe task failed: {e}")))),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(text) => {
                let mut r = text_response(StatusCode::OK, text);
                r.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static(prometheus::TEXT_FORMAT),
                );
                r
            }
            Err(e) => text_response(e.status(), e.to_string()),
        }
    } else {
        let mut r = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed".into());
        r.headers_mut().insert(ALLOW, HeaderValue::from_static("GET"));
        r
    };

    let headers = response.headers_mut();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate, max-age=0"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    Ok(response)
}

fn text_response(status: StatusCode, body: String) -> Response<BoxBody<Bytes, Infallible>> {
    let mut response = Response::new(Full::new(Bytes::from(body)).boxed());
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::config_store::ConfigStore;
    use crate::test_helpers::CountingEngine;
    use std::time::Duration;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> Arc<Prober> {
        prober_with(CountingEngine::default())
    }

    fn prober_with(engine: CountingEngine) -> Arc<Prober> {
        let tls = crate::client::tls_config().unwrap_or_else(|_| {
            Arc::new(
                rustls::ClientConfig::builder()
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth(),
            )
        });
        Arc::new(Prober::new(
            Arc::new(ConfigStore::new(Config::default())),
            Arc::new(engine),
            tls,
        ))
    }

    fn request(method: &str, uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .expect("request")
    }

    async fn body_text(resp: Response<BoxBody<Bytes, Infallible>>) -> String {
        let bytes = resp.into_body().collect().await.expect("body").to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn unknown_route_is_plain_404() {
        let resp = handle_request(request("GET", "/metrics"), prober())
            .await
            .expect("infallible");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().get(CACHE_CONTROL).is_none());
        assert_eq!(body_text(resp).await, "404 page not found");
    }

    #[tokio::test]
    async fn missing_params_are_400_with_no_cache() {
        let resp = handle_request(request("GET", "/probe?target=example.com"), prober())
            .await
            .expect("infallible");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()[PRAGMA], "no-cache");
        assert_eq!(resp.headers()[EXPIRES], "0");
        assert!(body_text(resp).await.contains("'ctx'"));
    }

    #[tokio::test]
    async fn post_is_not_allowed() {
        let resp = handle_request(request("POST", "/probe"), prober())
            .await
            .expect("infallible");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[ALLOW], "GET");
    }

    #[tokio::test]
    async fn abandoned_request_still_closes_tunnel() {
        let upstream = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&upstream)
            .await;

        let engine = CountingEngine::default();
        let lifecycle = engine.lifecycle.clone();
        let uri = format!(
            "/probe?ctx={}&target={}",
            url::form_urlencoded::byte_serialize(b"trojan://secret@127.0.0.1:443?security=none")
                .collect::<String>(),
            url::form_urlencoded::byte_serialize(format!("{}/slow", upstream.uri()).as_bytes())
                .collect::<String>(),
        );
        let pending = tokio::spawn(handle_request(request("GET", &uri), prober_with(engine)));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while lifecycle.started() == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(lifecycle.started(), 1);
        pending.abort();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while lifecycle.closed() == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(lifecycle.closed(), 1);
    }

    #[tokio::test]
    async fn run_server_bind_fails_when_port_taken() -> anyhow::Result<()> {
        let l = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = l.local_addr()?;
        let res = run_server(addr, prober()).await;
        assert!(res.is_err());
        drop(l);
        Ok(())
    }

    #[tokio::test]
    async fn run_server_with_limit_accepts_zero_and_returns_immediately() -> anyhow::Result<()> {
        let l = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = l.local_addr()?;
        drop(l);

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            run_server_with_limit(addr, prober(), Some(0)),
        )
        .await
        .expect("run_server_with_limit did not return within timeout")?;
        Ok(())
    }

    #[tokio::test]
    async fn run_server_with_limit_accepts_one_connection_and_returns() -> anyhow::Result<()> {
        use tokio::net::TcpStream;

        let l = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = l.local_addr()?;
        drop(l);

        let task = tokio::spawn(run_server_with_limit(addr, prober(), Some(1)));

        let mut stream_opt: Option<TcpStream> = None;
        for _ in 0..20 {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream_opt = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(50)).await,
            }
        }
        assert!(stream_opt.is_some(), "failed to connect to server");

        let res = tokio::time::timeout(std::time::Duration::from_secs(2), task).await??;
        assert!(res.is_ok());
        drop(stream_opt);
        Ok(())
    }
}
