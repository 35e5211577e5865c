// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Configuration loading and scope validation.
//!
//! TOML format:
//!
//! ```toml
//! [scopes.default]
//! timeout = "5s"
//!
//! [scopes.default.http]
//! method = "GET"
//! max_redirects = 5
//! headers = { "X-Probe" = "1" }
//!
//! [[scopes.default.http.fail_if]]
//! module = "status_code_set"
//! value = "500-599"
//! ```
//!
//! `${VAR}` and `${VAR:-fallback}` are expanded from the environment before
//! the document is parsed.

use crate::auth::AuthConfig;
use crate::rules::FailIfRule;
use hyper::{HeaderMap, Method};
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_SCOPE: &str = "default";

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_redirects() -> usize {
    5
}

fn default_method() -> Method {
    Method::GET
}

fn deserialize_method<'de, D>(deserializer: D) -> Result<Method, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Method::from_bytes(s.to_ascii_uppercase().as_bytes())
        .map_err(|_| serde::de::Error::custom(format!("invalid HTTP method '{s}'")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_method", deserialize_with = "deserialize_method")]
    pub method: Method,

    /// Redirects followed before the last response is kept as final.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(
        default,
        deserialize_with = "crate::serde_helpers::deserialize_headers"
    )]
    pub headers: HeaderMap,

    #[serde(default)]
    pub body: Option<String>,

    /// Read in full before each probe starts.
    #[serde(default)]
    pub body_file: Option<PathBuf>,

    #[serde(default)]
    pub fail_if: Vec<FailIfRule>,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            max_redirects: default_max_redirects(),
            headers: HeaderMap::new(),
            body: None,
            body_file: None,
            fail_if: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

impl HttpConfig {
    fn validate(&mut self) -> anyhow::Result<()> {
        if self.body.is_some() && self.body_file.is_some() {
            return Err(anyhow::anyhow!(
                "http: only one of 'body' or 'body_file' may be set"
            ));
        }
        crate::rules::validate_rules(&self.fail_if).map_err(|e| anyhow::anyhow!("http.{e}"))?;
        self.auth
            .prepare()
            .map_err(|e| anyhow::anyhow!("http.{e}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Bounds the whole HTTP exchange, redirects and body included.
    #[serde(
        default = "default_timeout",
        deserialize_with = "crate::serde_helpers::duration::deserialize"
    )]
    pub timeout: Duration,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scopes: HashMap<String, ScopeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(DEFAULT_SCOPE.to_string(), ScopeConfig::default());
        Self { scopes }
    }
}

impl Config {
    /// Load, expand and validate a configuration file.
    pub async fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let s = tokio::fs::read_to_string(path_ref)
            .await
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path_ref.display(), e))?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let expanded = expand_env(s);
        let mut cfg: Self = toml::from_str(&expanded)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate every scope and build its auth strategy. The default scope is
    /// inserted when the document does not define one.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        for (name, scope) in self.scopes.iter_mut() {
            scope
                .http
                .validate()
                .map_err(|e| anyhow::anyhow!("scope '{}': {}", name, e))?;
        }
        self.scopes
            .entry(DEFAULT_SCOPE.to_string())
            .or_default();
        Ok(())
    }

    /// Look up a scope; `None` selects the default scope.
    pub fn scope(&self, name: Option<&str>) -> Option<&ScopeConfig> {
        self.scopes.get(name.unwrap_or(DEFAULT_SCOPE))
    }
}

fn env_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").ok())
        .as_ref()
}

/// Replace `${VAR}` and `${VAR:-fallback}` with environment values. Unset
/// variables without a fallback expand to the empty string.
pub fn expand_env(input: &str) -> String {
    let Some(pattern) = env_pattern() else {
        return input.to_string();
    };
    pattern
        .replace_all(input, |caps: &Captures<'_>| {
            match std::env::var(&caps[1]) {
                Ok(v) if !v.is_empty() => v,
                _ => caps
                    .get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            }
        })
        .into_owned()
}
