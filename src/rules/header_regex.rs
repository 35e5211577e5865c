// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Matches when every value of a header matches a pattern.
//!
//! The rule value is `Header-Name:pattern`, split at the first colon. A header
//! that is absent never matches.

use crate::rules::{Check, FailIfModule, ResponseView, ValidationError};
use regex::Regex;

pub struct HeaderRegex;

fn split(value: &str) -> Result<(&str, &str), ValidationError> {
    let (name, pattern) = value
        .split_once(':')
        .ok_or_else(|| ValidationError::HeaderFormat(value.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::HeaderFormat(value.to_string()));
    }
    Ok((name, pattern))
}

impl Check for HeaderRegex {
    fn module(&self) -> FailIfModule {
        FailIfModule::HeaderRegex
    }

    fn validate(&self, value: &str) -> Result<(), ValidationError> {
        let (name, pattern) = split(value)?;
        hyper::header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ValidationError::HeaderFormat(value.to_string()))?;
        Regex::new(pattern)?;
        Ok(())
    }

    fn matches(&self, response: &ResponseView<'_>, value: &str) -> Result<bool, ValidationError> {
        let (name, pattern) = split(value)?;
        let values: Vec<_> = response.headers.get_all(name).iter().collect();
        if values.is_empty() {
            return Ok(false);
        }
        let re = Regex::new(pattern)?;
        Ok(values
            .iter()
            .all(|v| re.is_match(&String::from_utf8_lossy(v.as_bytes()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::response_view;
    use hyper::header::HeaderValue;
    use hyper::HeaderMap;
    use rstest::rstest;

    fn headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("content-type", HeaderValue::from_static("application/json"));
        h.append("x-node", HeaderValue::from_static("edge-1"));
        h.append("x-node", HeaderValue::from_static("edge-2"));
        h.insert("x-time", HeaderValue::from_static("12:30"));
        h
    }

    #[rstest]
    #[case("Content-Type:json", true)]
    #[case("content-type:^text/", false)]
    #[case("X-Node:^edge-\\d$", true)]
    #[case("X-Node:edge-1", false)]
    #[case("X-Missing:.*", false)]
    #[case("X-Time:^12:30$", true)]
    fn matches_header_values(#[case] value: &str, #[case] expected: bool) {
        let h = headers();
        let view = response_view(200, &h, None, false);
        assert_eq!(HeaderRegex.matches(&view, value).expect("eval"), expected);
    }

    #[test]
    fn value_without_colon_is_an_error() {
        let h = headers();
        let view = response_view(200, &h, None, false);
        assert!(matches!(
            HeaderRegex.matches(&view, "Content-Type"),
            Err(ValidationError::HeaderFormat(_))
        ));
    }

    #[rstest]
    #[case("Content-Type:json", true)]
    #[case("NoColon", false)]
    #[case(":json", false)]
    #[case("Bad Name:json", false)]
    #[case("Content-Type:(", false)]
    fn validation(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(HeaderRegex.validate(value).is_ok(), ok);
    }
}
