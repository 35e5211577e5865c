// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Outgoing request authentication.
//!
//! A scope configures at most one strategy. Strategies are built and
//! initialised once at configuration load, then shared read-only by every
//! probe that uses the scope.

pub mod basic;
pub mod bearer;

use hyper::HeaderMap;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use basic::BasicAuth;
pub use bearer::{BearerJwt, BearerRaw};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credentials must not be empty")]
    EmptyCredentials,
    #[error("either 'key' or 'key_file' is required")]
    MissingKey,
    #[error("cannot read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid signing key: {0}")]
    Key(jsonwebtoken::errors::Error),
    #[error("cannot sign token: {0}")]
    Sign(jsonwebtoken::errors::Error),
    #[error("unsupported signing algorithm '{0}'")]
    UnsupportedAlgorithm(&'static str),
    #[error("unsupported JWT header field '{0}'")]
    UnsupportedHeader(String),
    #[error("JWT header field '{0}' must be a string")]
    InvalidHeaderField(String),
    #[error("credentials do not form a valid header value")]
    InvalidHeaderValue(#[from] hyper::header::InvalidHeaderValue),
    #[error("strategy used before initialisation")]
    NotInitialized,
}

pub trait AuthStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Validate settings and prepare any cached material.
    fn init(&mut self) -> Result<(), AuthError>;

    /// Add credentials to an outgoing request.
    fn issue(&self, headers: &mut HeaderMap) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuthConfig {
    pub id: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BearerKind {
    Raw,
    JwtHs256,
    JwtHs384,
    JwtHs512,
    JwtRs256,
    JwtRs384,
    JwtRs512,
    JwtPs256,
    JwtPs384,
    JwtPs512,
    JwtEs256,
    JwtEs384,
    JwtEs512,
    JwtEddsa,
}

fn default_refresh() -> bool {
    true
}

fn default_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BearerAuthConfig {
    pub kind: BearerKind,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(default = "default_refresh")]
    pub refresh: bool,
    #[serde(
        default = "default_interval",
        deserialize_with = "crate::serde_helpers::duration::deserialize"
    )]
    pub interval: Duration,
    #[serde(default)]
    pub claims: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub headers: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub basic: Option<BasicAuthConfig>,
    pub bearer: Option<BearerAuthConfig>,
    #[serde(skip)]
    strategy: Option<Arc<dyn AuthStrategy>>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("basic", &self.basic.as_ref().map(|b| &b.id))
            .field("bearer", &self.bearer.as_ref().map(|b| b.kind))
            .field("strategy", &self.strategy.as_ref().map(|s| s.name()))
            .finish()
    }
}

impl AuthConfig {
    /// Build and initialise the configured strategy, if any.
    pub fn prepare(&mut self) -> anyhow::Result<()> {
        let mut strategy: Box<dyn AuthStrategy> = match (&self.basic, &self.bearer) {
            (Some(_), Some(_)) => {
                return Err(anyhow::anyhow!(
                    "auth: only one of 'basic' or 'bearer' may be configured"
                ))
            }
            (Some(basic), None) => Box::new(BasicAuth::new(&basic.id, &basic.password)),
            (None, Some(bearer)) => match bearer.kind {
                BearerKind::Raw => Box::new(BearerRaw::new(bearer.key.clone().unwrap_or_default())),
                _ => Box::new(BearerJwt::from_config(bearer)),
            },
            (None, None) => {
                self.strategy = None;
                return Ok(());
            }
        };
        strategy
            .init()
            .map_err(|e| anyhow::anyhow!("auth.{}: {}", strategy.name(), e))?;
        self.strategy = Some(Arc::from(strategy));
        Ok(())
    }

    pub fn strategy(&self) -> Option<&Arc<dyn AuthStrategy>> {
        self.strategy.as_ref()
    }

    pub fn with_strategy(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self {
            strategy: Some(strategy),
            ..Default::default()
        }
    }
}
