// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Serde helpers for configuration values: header tables and durations.

use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Deserialize a `name = "value"` table into a header map, rejecting names or
/// values that are not valid HTTP.
pub fn deserialize_headers<'de, D>(deserializer: D) -> Result<HeaderMap, D::Error>
where
    D: Deserializer<'de>,
{
    let map = BTreeMap::<String, String>::deserialize(deserializer)?;
    let mut hm = HeaderMap::with_capacity(map.len());
    for (k, v) in map {
        let name = k
            .parse::<HeaderName>()
            .map_err(|e| serde::de::Error::custom(format!("header '{k}': {e}")))?;
        let val = v
            .parse::<HeaderValue>()
            .map_err(|e| serde::de::Error::custom(format!("header '{k}': {e}")))?;
        hm.insert(name, val);
    }
    Ok(hm)
}

pub mod duration {
    //! Durations written in humantime form (`"5s"`, `"250ms"`, `"1m 30s"`)
    //! or as a bare integer number of seconds.

    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text).map_err(serde::de::Error::custom),
        }
    }

    pub fn parse(input: &str) -> Result<Duration, String> {
        let text = input.trim();
        if let Ok(secs) = text.parse::<u64>() {
            return Ok(Duration::from_secs(secs));
        }
        humantime::parse_duration(text).map_err(|e| format!("invalid duration '{input}': {e}"))
    }
}
