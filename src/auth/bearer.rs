// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Bearer tokens: a static credential or a locally minted JWT.
//!
//! JWTs are minted at init and re-minted lazily once the cached token is
//! within one second of expiry. Readers share a read lock; the first caller
//! past the deadline upgrades to the write lock and re-checks before minting,
//! so concurrent callers never mint twice for the same window.

use super::{AuthError, AuthStrategy, BearerAuthConfig, BearerKind};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hyper::header::{HeaderValue, AUTHORIZATION};
use hyper::HeaderMap;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

fn set_bearer(headers: &mut HeaderMap, token: &str) -> Result<(), AuthError> {
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))?,
    );
    Ok(())
}

#[derive(Clone)]
pub struct BearerRaw {
    credentials: String,
}

impl std::fmt::Debug for BearerRaw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerRaw").finish_non_exhaustive()
    }
}

impl BearerRaw {
    pub fn new(credentials: impl Into<String>) -> Self {
        Self {
            credentials: credentials.into(),
        }
    }
}

impl AuthStrategy for BearerRaw {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn init(&mut self) -> Result<(), AuthError> {
        if self.credentials.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }
        Ok(())
    }

    fn issue(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        set_bearer(headers, &self.credentials)
    }
}

fn algorithm(kind: BearerKind) -> Result<Algorithm, AuthError> {
    Ok(match kind {
        BearerKind::JwtHs256 => Algorithm::HS256,
        BearerKind::JwtHs384 => Algorithm::HS384,
        BearerKind::JwtHs512 => Algorithm::HS512,
        BearerKind::JwtRs256 => Algorithm::RS256,
        BearerKind::JwtRs384 => Algorithm::RS384,
        BearerKind::JwtRs512 => Algorithm::RS512,
        BearerKind::JwtPs256 => Algorithm::PS256,
        BearerKind::JwtPs384 => Algorithm::PS384,
        BearerKind::JwtPs512 => Algorithm::PS512,
        BearerKind::JwtEs256 => Algorithm::ES256,
        BearerKind::JwtEs384 => Algorithm::ES384,
        BearerKind::JwtEddsa => Algorithm::EdDSA,
        BearerKind::JwtEs512 => return Err(AuthError::UnsupportedAlgorithm("ES512")),
        BearerKind::Raw => return Err(AuthError::UnsupportedAlgorithm("raw")),
    })
}

fn encoding_key(alg: Algorithm, material: &[u8]) -> Result<EncodingKey, AuthError> {
    let key = match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Ok(EncodingKey::from_secret(material))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => EncodingKey::from_rsa_pem(material),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(material),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(material),
    };
    key.map_err(AuthError::Key)
}

fn apply_header_fields(header: &mut Header, fields: &Map<String, Value>) -> Result<(), AuthError> {
    for (name, value) in fields {
        let text = value
            .as_str()
            .ok_or_else(|| AuthError::InvalidHeaderField(name.clone()))?
            .to_string();
        match name.as_str() {
            "kid" => header.kid = Some(text),
            "cty" => header.cty = Some(text),
            "jku" => header.jku = Some(text),
            "x5u" => header.x5u = Some(text),
            "x5t" => header.x5t = Some(text),
            "x5t#S256" => header.x5t_s256 = Some(text),
            "typ" => header.typ = Some(text),
            other => return Err(AuthError::UnsupportedHeader(other.to_string())),
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct CachedToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map_or(false, |exp| now > exp - ChronoDuration::seconds(1))
    }
}

pub struct BearerJwt {
    kind: BearerKind,
    key: Option<String>,
    key_file: Option<PathBuf>,
    refresh: bool,
    interval: Duration,
    claims: Map<String, Value>,
    header_fields: Map<String, Value>,
    header: Header,
    signing_key: Option<EncodingKey>,
    cache: RwLock<CachedToken>,
}

impl std::fmt::Debug for BearerJwt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerJwt")
            .field("kind", &self.kind)
            .field("key_file", &self.key_file)
            .field("refresh", &self.refresh)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl BearerJwt {
    pub fn from_config(cfg: &BearerAuthConfig) -> Self {
        Self {
            kind: cfg.kind,
            key: cfg.key.clone(),
            key_file: cfg.key_file.clone(),
            refresh: cfg.refresh,
            interval: cfg.interval,
            claims: cfg.claims.clone(),
            header_fields: cfg.headers.clone(),
            header: Header::default(),
            signing_key: None,
            cache: RwLock::new(CachedToken::default()),
        }
    }

    fn key_material(&self) -> Result<Vec<u8>, AuthError> {
        // The key file wins when both are given.
        if let Some(path) = &self.key_file {
            return std::fs::read(path).map_err(|source| AuthError::KeyFile {
                path: path.clone(),
                source,
            });
        }
        match &self.key {
            Some(key) if !key.is_empty() => Ok(key.as_bytes().to_vec()),
            _ => Err(AuthError::MissingKey),
        }
    }

    pub fn init_at(&mut self, now: DateTime<Utc>) -> Result<(), AuthError> {
        let alg = algorithm(self.kind)?;
        let material = self.key_material()?;
        self.signing_key = Some(encoding_key(alg, &material)?);

        let mut header = Header::new(alg);
        header.typ = Some("JWT".to_string());
        apply_header_fields(&mut header, &self.header_fields)?;
        self.header = header;

        let fresh = self.mint(now)?;
        *self.cache.get_mut() = fresh;
        Ok(())
    }

    fn mint(&self, now: DateTime<Utc>) -> Result<CachedToken, AuthError> {
        let key = self.signing_key.as_ref().ok_or(AuthError::NotInitialized)?;
        let mut claims = self.claims.clone();
        let expires_at = if self.refresh {
            let interval =
                ChronoDuration::from_std(self.interval).unwrap_or_else(|_| ChronoDuration::zero());
            let exp = now + interval;
            claims.insert("iat".to_string(), Value::from(now.timestamp()));
            claims.insert("exp".to_string(), Value::from(exp.timestamp()));
            Some(exp)
        } else {
            None
        };
        let token = jsonwebtoken::encode(&self.header, &claims, key).map_err(AuthError::Sign)?;
        Ok(CachedToken { token, expires_at })
    }

    pub fn issue_at(&self, headers: &mut HeaderMap, now: DateTime<Utc>) -> Result<(), AuthError> {
        let (token, due) = {
            let cache = self.cache.read();
            (cache.token.clone(), self.refresh && cache.is_due(now))
        };
        if token.is_empty() {
            return Err(AuthError::NotInitialized);
        }
        if !due {
            return set_bearer(headers, &token);
        }

        let mut cache = self.cache.write();
        if cache.is_due(now) {
            *cache = self.mint(now)?;
        }
        set_bearer(headers, &cache.token)
    }
}

impl AuthStrategy for BearerJwt {
    fn name(&self) -> &'static str {
        "bearer"
    }

    fn init(&mut self) -> Result<(), AuthError> {
        self.init_at(Utc::now())
    }

    fn issue(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        self.issue_at(headers, Utc::now())
    }
}
