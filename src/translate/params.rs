// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Uniform key namespace for stream parameters.
//!
//! Query-string descriptors already use the share-link names (`type`,
//! `security`, `headerType`, `sni`...). VMess JSON uses its own names, so its
//! fields are remapped into the same namespace before the stream parser runs.

use crate::descriptor::ConnectionDescriptor;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// VMess JSON field -> share-link parameter name.
const VMESS_FIELD_MAP: &[(&str, &str)] = &[
    ("net", "type"),
    ("tls", "security"),
    ("type", "headerType"),
    ("host", "host"),
    ("path", "path"),
    ("sni", "sni"),
    ("alpn", "alpn"),
    ("fp", "fp"),
    ("allowInsecure", "allowInsecure"),
    ("ech", "ech"),
    ("pbk", "pbk"),
    ("sid", "sid"),
    ("spx", "spx"),
    ("pqv", "pqv"),
    ("authority", "authority"),
    ("serviceName", "serviceName"),
    ("mode", "mode"),
    ("seed", "seed"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamParams {
    values: HashMap<String, String>,
}

impl StreamParams {
    pub fn from_query(descriptor: &ConnectionDescriptor) -> Self {
        let mut values = HashMap::new();
        for (k, v) in descriptor.query_pairs() {
            // first occurrence wins, like url.Values.Get
            values.entry(k.to_string()).or_insert_with(|| v.to_string());
        }
        Self { values }
    }

    pub fn from_vmess(inner: &Map<String, Value>) -> Self {
        let mut values = HashMap::new();
        for (from, to) in VMESS_FIELD_MAP {
            if let Some(v) = inner.get(*from).and_then(value_to_string) {
                values.insert(to.to_string(), v);
            }
        }
        let mut params = Self { values };

        // VMess overloads `path` and `type` depending on the network.
        let network = params.get("type").unwrap_or_default().to_ascii_lowercase();
        match network.as_str() {
            "grpc" => {
                params.fill_from("serviceName", "path");
                params.fill_from("mode", "headerType");
            }
            "kcp" | "mkcp" => params.fill_from("seed", "path"),
            "xhttp" | "splithttp" => params.fill_from("mode", "headerType"),
            _ => {}
        }
        params
    }

    fn fill_from(&mut self, key: &str, source: &str) {
        if self.get(key).is_none() {
            if let Some(v) = self.get(source).map(str::to_string) {
                self.values.insert(key.to_string(), v);
            }
        }
    }

    /// Non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.to_ascii_lowercase()).as_deref(),
            Some("1" | "true" | "yes")
        )
    }
}

/// Stringify a JSON scalar; VMess producers disagree on numbers vs strings.
pub(crate) fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
