// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Connection descriptors: share-link style URIs naming a tunnel endpoint.
//!
//! Two shapes exist. Regular URIs (`vless://id@host:port?query#name`) are
//! parsed with `url`. Payload schemes (`vmess://<base64>`, `wireguard://<base64>`)
//! carry an opaque inline document after `://` that the translator decodes.

use crate::translate::TranslateError;
use percent_encoding::percent_decode_str;
use url::Url;

/// Schemes whose body is an inline encoded document instead of an authority.
const PAYLOAD_SCHEMES: &[&str] = &["vmess", "wireguard", "wg", "awg", "amneziawg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    payload: Option<String>,
    query: Vec<(String, String)>,
    fragment: Option<String>,
}

impl ConnectionDescriptor {
    pub fn parse(raw: &str) -> Result<Self, TranslateError> {
        let raw = raw.trim();
        let (scheme, rest) = raw.split_once("://").ok_or_else(|| {
            TranslateError::MalformedDescriptor("missing '://' separator".to_string())
        })?;
        if scheme.is_empty() {
            return Err(TranslateError::MalformedDescriptor(
                "empty scheme".to_string(),
            ));
        }
        let scheme = scheme.to_ascii_lowercase();

        if PAYLOAD_SCHEMES.contains(&scheme.as_str()) {
            return Ok(Self::parse_payload(scheme, rest));
        }

        let url = Url::parse(raw).map_err(|e| TranslateError::MalformedDescriptor(e.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string());
        let user = match url.password() {
            Some(password) => Some(format!(
                "{}:{}",
                decode_component(url.username()),
                decode_component(password)
            )),
            None => Some(url.username())
                .filter(|u| !u.is_empty())
                .map(decode_component),
        };

        Ok(Self {
            scheme,
            host,
            port: url.port(),
            user,
            payload: None,
            query: url.query_pairs().into_owned().collect(),
            fragment: url.fragment().map(decode_component),
        })
    }

    fn parse_payload(scheme: String, rest: &str) -> Self {
        let (body, fragment) = match rest.split_once('#') {
            Some((body, fragment)) => (body, Some(decode_component(fragment))),
            None => (rest, None),
        };
        let (payload, query) = body.split_once('?').unwrap_or((body, ""));
        let query = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        Self {
            scheme,
            host: None,
            port: None,
            user: None,
            payload: Some(decode_component(payload)).filter(|p| !p.is_empty()),
            query,
            fragment,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Percent-decoded userinfo (the credential slot of share links),
    /// `user:password` when both halves are present.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// First value of the named query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Display name carried in the fragment, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }
}

fn decode_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}
