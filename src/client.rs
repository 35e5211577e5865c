// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! HTTP client that dials through a tunnel and traces every round trip.
//!
//! Each round trip opens a fresh connection through [`Tunnel::dial`], so a
//! redirect chain yields one trace per hop. Redirects are followed manually
//! up to a cap; hitting the cap keeps the last response instead of failing.

use crate::cookie_jar::CookieJar;
use crate::engine::{BoxedIo, Tunnel};
use crate::trace::TraceLog;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper::header::{
    HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION,
};
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri, Version};
use hyper_rustls::ConfigBuilderExt;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::{Host, Url};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("URL has no host: {0}")]
    MissingHost(String),
    #[error("cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },
    #[error("no address found for {0}")]
    NoAddress(String),
    #[error("dial {target} failed: {source}")]
    Dial {
        target: String,
        source: std::io::Error,
    },
    #[error("invalid TLS server name '{0}'")]
    ServerName(String),
    #[error("TLS handshake failed: {0}")]
    Tls(std::io::Error),
    #[error("invalid request URI: {0}")]
    Uri(#[from] hyper::http::uri::InvalidUri),
    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error(transparent)]
    Http(#[from] hyper::Error),
    #[error("invalid redirect location '{0}'")]
    Redirect(String),
}

/// Client TLS settings shared by every probe: native roots, h2 then http/1.1.
pub fn tls_config() -> std::io::Result<Arc<rustls::ClientConfig>> {
    let mut config = rustls::ClientConfig::builder()
        .with_native_roots()?
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Incoming,
    /// Location and method of the final round trip.
    pub url: Url,
    pub method: Method,
    pub used_tls: bool,
}

impl ClientResponse {
    /// Declared `Content-Length`, if the response carries a parsable one.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }
}

enum Sender {
    Http1(http1::SendRequest<Full<Bytes>>),
    Http2(http2::SendRequest<Full<Bytes>>),
}

impl Sender {
    async fn send(&mut self, req: Request<Full<Bytes>>) -> Result<Response<Incoming>, hyper::Error> {
        match self {
            Sender::Http1(s) => s.send_request(req).await,
            Sender::Http2(s) => s.send_request(req).await,
        }
    }
}

pub struct ProbeClient<'t> {
    tunnel: &'t dyn Tunnel,
    trace: TraceLog,
    tls: TlsConnector,
    cookies: CookieJar,
    max_redirects: usize,
    redirects: usize,
}

impl<'t> ProbeClient<'t> {
    pub fn new(
        tunnel: &'t dyn Tunnel,
        trace: TraceLog,
        tls: Arc<rustls::ClientConfig>,
        max_redirects: usize,
    ) -> Self {
        Self {
            tunnel,
            trace,
            tls: TlsConnector::from(tls),
            cookies: CookieJar::new(),
            max_redirects,
            redirects: 0,
        }
    }

    /// Redirects followed so far, also meaningful after a failed send.
    pub fn redirects(&self) -> usize {
        self.redirects
    }

    pub async fn send(&mut self, request: ClientRequest) -> Result<ClientResponse, ClientError> {
        let ClientRequest {
            mut method,
            mut url,
            mut headers,
            mut body,
        } = request;
        url.set_fragment(None);

        loop {
            let mut hop_headers = headers.clone();
            if let Some(cookie) = self.cookies.header_for(&url) {
                merge_cookie(&mut hop_headers, cookie);
            }

            let response = self
                .round_trip(&method, &url, hop_headers, body.clone())
                .await?;
            self.cookies.store_from(response.headers(), &url);

            let status = response.status();
            let location = redirect_location(&response);
            let Some(location) = location else {
                return Ok(finish(response, url, method));
            };
            if self.redirects >= self.max_redirects {
                debug!(max = self.max_redirects, %status, "redirect limit reached, keeping last response");
                return Ok(finish(response, url, method));
            }

            let mut next = url
                .join(&location)
                .map_err(|_| ClientError::Redirect(location.clone()))?;
            next.set_fragment(None);
            self.redirects += 1;
            debug!(hop = self.redirects, %status, from = %url, to = %next, "following redirect");

            if matches!(status.as_u16(), 301..=303) {
                if (status != StatusCode::SEE_OTHER && method == Method::POST)
                    || (status == StatusCode::SEE_OTHER && method != Method::HEAD)
                {
                    method = Method::GET;
                }
                body = Bytes::new();
                headers.remove(CONTENT_TYPE);
                headers.remove(CONTENT_LENGTH);
            }
            if next.host_str() != url.host_str() {
                headers.remove(AUTHORIZATION);
                headers.remove(COOKIE);
            }
            url = next;
        }
    }

    async fn round_trip(
        &self,
        method: &Method,
        url: &Url,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response<Incoming>, ClientError> {
        let secure = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        };
        let host = url
            .host()
            .ok_or_else(|| ClientError::MissingHost(url.to_string()))?;
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        self.trace.open_round_trip(secure);

        let (name, dial_host) = match host {
            Host::Domain(domain) => {
                let dial_host = if self.tunnel.resolves_locally() {
                    self.resolve(domain, port).await?.ip().to_string()
                } else {
                    domain.to_string()
                };
                (domain.to_string(), dial_host)
            }
            Host::Ipv4(ip) => (ip.to_string(), ip.to_string()),
            Host::Ipv6(ip) => (ip.to_string(), ip.to_string()),
        };

        self.trace.connect_start();
        let io = self
            .tunnel
            .dial(&dial_host, port)
            .await
            .map_err(|source| ClientError::Dial {
                target: format!("{name}:{port}"),
                source,
            })?;
        self.trace.connect_done();

        let (io, h2): (BoxedIo, bool) = if secure {
            self.trace.tls_start();
            let server_name = ServerName::try_from(name.clone())
                .map_err(|_| ClientError::ServerName(name.clone()))?;
            let stream = self
                .tls
                .connect(server_name, io)
                .await
                .map_err(ClientError::Tls)?;
            self.trace.tls_done();
            let h2 = stream.get_ref().1.alpn_protocol() == Some(&b"h2"[..]);
            (Box::new(stream), h2)
        } else {
            (io, false)
        };
        self.trace.got_connection();

        let request = build_request(method, url, headers, body, h2)?;
        let mut sender = if h2 {
            let (sender, conn) = http2::handshake(TokioExecutor::new(), TokioIo::new(io)).await?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(%e, "http2 connection closed with error");
                }
            });
            Sender::Http2(sender)
        } else {
            let (sender, conn) = http1::handshake(TokioIo::new(io)).await?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(%e, "http1 connection closed with error");
                }
            });
            Sender::Http1(sender)
        };

        let response = sender.send(request).await?;
        self.trace.first_byte();
        Ok(response)
    }

    async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr, ClientError> {
        self.trace.dns_start();
        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| ClientError::Resolve {
                host: host.to_string(),
                source,
            })?;
        let addr = addrs
            .next()
            .ok_or_else(|| ClientError::NoAddress(host.to_string()))?;
        self.trace.dns_done();
        Ok(addr)
    }
}

fn finish(response: Response<Incoming>, url: Url, method: Method) -> ClientResponse {
    let used_tls = url.scheme() == "https";
    let (parts, body) = response.into_parts();
    ClientResponse {
        status: parts.status,
        headers: parts.headers,
        body,
        url,
        method,
        used_tls,
    }
}

fn redirect_location(response: &Response<Incoming>) -> Option<String> {
    if !matches!(response.status().as_u16(), 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn merge_cookie(headers: &mut HeaderMap, jar_value: HeaderValue) {
    let merged = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => {
            let joined = format!("{}; {}", existing, jar_value.to_str().unwrap_or_default());
            HeaderValue::from_str(&joined).unwrap_or(jar_value)
        }
        _ => jar_value,
    };
    headers.insert(COOKIE, merged);
}

/// HTTP/1 gets an origin-form target plus `Host`; HTTP/2 an absolute URI.
fn build_request(
    method: &Method,
    url: &Url,
    headers: HeaderMap,
    body: Bytes,
    h2: bool,
) -> Result<Request<Full<Bytes>>, ClientError> {
    let uri: Uri = if h2 {
        url.as_str().parse()?
    } else {
        let mut target = url.path().to_string();
        if let Some(q) = url.query() {
            target.push('?');
            target.push_str(q);
        }
        target.parse()?
    };

    let mut req = Request::builder()
        .method(method.clone())
        .uri(uri)
        .body(Full::new(body))?;
    *req.headers_mut() = headers;

    if h2 {
        *req.version_mut() = Version::HTTP_2;
        req.headers_mut().remove(HOST);
    } else {
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => String::new(),
        };
        req.headers_mut()
            .insert(HOST, HeaderValue::from_str(&host).map_err(hyper::http::Error::from)?);
    }
    Ok(req)
}
