// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Fail-if rules: response predicates that turn a probe into a failure.
//!
//! A rule fails the probe when its predicate matches, or when it does not
//! match and the rule is inverted. Rules are evaluated in configured order and
//! evaluation stops at the first failing rule. A predicate that cannot be
//! evaluated (bad JSON, broken expression) always fails, inverted or not.

use hyper::HeaderMap;
use serde::Deserialize;
use tracing::debug;

pub mod body_json_cel;
pub mod body_regex;
pub mod header_regex;
pub mod ssl;
pub mod status_code_set;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailIfModule {
    Ssl,
    #[serde(alias = "body_matches_regexp")]
    BodyRegex,
    #[serde(alias = "body_json_matches_cel")]
    BodyJsonCel,
    #[serde(alias = "header_matches_regexp")]
    HeaderRegex,
    #[serde(alias = "status_code_matches")]
    StatusCodeSet,
}

impl FailIfModule {
    pub const ALL: [FailIfModule; 5] = [
        FailIfModule::Ssl,
        FailIfModule::BodyRegex,
        FailIfModule::BodyJsonCel,
        FailIfModule::HeaderRegex,
        FailIfModule::StatusCodeSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailIfModule::Ssl => "ssl",
            FailIfModule::BodyRegex => "body_regex",
            FailIfModule::BodyJsonCel => "body_json_cel",
            FailIfModule::HeaderRegex => "header_regex",
            FailIfModule::StatusCodeSet => "status_code_set",
        }
    }

    /// Per-module failure gauge name.
    pub fn metric_name(&self) -> &'static str {
        match self {
            FailIfModule::Ssl => "tun_probe_failed_due_to_ssl",
            FailIfModule::BodyRegex => "tun_probe_failed_due_to_regex_body",
            FailIfModule::BodyJsonCel => "tun_probe_failed_due_to_cel",
            FailIfModule::HeaderRegex => "tun_probe_failed_due_to_regex_header",
            FailIfModule::StatusCodeSet => "tun_probe_failed_due_to_status",
        }
    }
}

impl std::fmt::Display for FailIfModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailIfRule {
    #[serde(alias = "mod")]
    pub module: FailIfModule,
    #[serde(default, alias = "val")]
    pub value: String,
    #[serde(default, alias = "inv")]
    pub invert: bool,
}

impl FailIfRule {
    pub fn new(module: FailIfModule, value: impl Into<String>, invert: bool) -> Self {
        Self {
            module,
            value: value.into(),
            invert,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CEL error: {0}")]
    Cel(String),
    #[error("CEL expression returned {0}, expected a boolean")]
    NotBoolean(String),
    #[error("expected 'Header-Name:pattern', got '{0}'")]
    HeaderFormat(String),
    #[error("invalid status code set: {0}")]
    StatusSet(String),
    #[error("response body was not captured")]
    MissingBody,
}

/// The slice of a response that rules may inspect.
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    pub status: u16,
    pub headers: &'a HeaderMap,
    pub body: Option<&'a [u8]>,
    pub used_tls: bool,
}

impl<'a> ResponseView<'a> {
    pub fn body(&self) -> Result<&'a [u8], ValidationError> {
        self.body.ok_or(ValidationError::MissingBody)
    }
}

pub trait Check: Send + Sync {
    fn module(&self) -> FailIfModule;

    /// Whether the predicate reads the response body.
    fn needs_body(&self) -> bool {
        false
    }

    /// Validate the rule value. Called once at configuration load.
    fn validate(&self, _value: &str) -> Result<(), ValidationError> {
        Ok(())
    }

    fn matches(&self, response: &ResponseView<'_>, value: &str) -> Result<bool, ValidationError>;
}

pub fn check_for(module: FailIfModule) -> &'static dyn Check {
    match module {
        FailIfModule::Ssl => &ssl::Ssl,
        FailIfModule::BodyRegex => &body_regex::BodyRegex,
        FailIfModule::BodyJsonCel => &body_json_cel::BodyJsonCel,
        FailIfModule::HeaderRegex => &header_regex::HeaderRegex,
        FailIfModule::StatusCodeSet => &status_code_set::StatusCodeSet,
    }
}

/// Validate every rule, reporting the first problem with its position.
pub fn validate_rules(rules: &[FailIfRule]) -> anyhow::Result<()> {
    for (idx, rule) in rules.iter().enumerate() {
        if rule.module != FailIfModule::Ssl && rule.value.is_empty() {
            return Err(anyhow::anyhow!(
                "fail_if[{}]: module '{}' requires a value",
                idx,
                rule.module
            ));
        }
        check_for(rule.module)
            .validate(&rule.value)
            .map_err(|e| anyhow::anyhow!("fail_if[{}] ({}): {}", idx, rule.module, e))?;
    }
    Ok(())
}

pub fn needs_body(rules: &[FailIfRule]) -> bool {
    rules.iter().any(|r| check_for(r.module).needs_body())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub success: bool,
    /// Position and module of the rule that failed the probe.
    pub failed: Option<(usize, FailIfModule)>,
}

pub fn evaluate(response: &ResponseView<'_>, rules: &[FailIfRule]) -> Verdict {
    for (idx, rule) in rules.iter().enumerate() {
        let check = check_for(rule.module);
        let matched = match check.matches(response, &rule.value) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(rule = idx, module = %check.module(), %e, "fail_if evaluation error");
                // Forces a failure regardless of inversion.
                !rule.invert
            }
        };
        let success = rule.invert != !matched;
        if !success {
            debug!(rule = idx, module = %check.module(), matched, invert = rule.invert, "fail_if triggered");
            return Verdict {
                success: false,
                failed: Some((idx, check.module())),
            };
        }
    }
    Verdict {
        success: true,
        failed: None,
    }
}
