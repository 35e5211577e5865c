// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Matches when the status code is in a comma-separated set of codes and
//! inclusive ranges, e.g. `200,301-308`.

use crate::rules::{Check, FailIfModule, ResponseView, ValidationError};

pub struct StatusCodeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Exact(u16),
    Range(u16, u16),
}

fn parse_segment(raw: &str) -> Option<Segment> {
    let raw = raw.trim();
    match raw.split_once('-') {
        Some((lo, hi)) => {
            let lo = lo.trim().parse().ok()?;
            let hi = hi.trim().parse().ok()?;
            Some(Segment::Range(lo, hi))
        }
        None => raw.parse().ok().map(Segment::Exact),
    }
}

/// Whether `status` belongs to the set; malformed segments never match.
pub fn contains(set: &str, status: u16) -> bool {
    set.split(',')
        .filter_map(parse_segment)
        .any(|segment| match segment {
            Segment::Exact(code) => code == status,
            Segment::Range(lo, hi) => (lo..=hi).contains(&status),
        })
}

impl Check for StatusCodeSet {
    fn module(&self) -> FailIfModule {
        FailIfModule::StatusCodeSet
    }

    fn validate(&self, value: &str) -> Result<(), ValidationError> {
        for segment in value.split(',') {
            if parse_segment(segment).is_none() {
                return Err(ValidationError::StatusSet(format!(
                    "malformed segment '{}'",
                    segment.trim()
                )));
            }
        }
        Ok(())
    }

    fn matches(&self, response: &ResponseView<'_>, value: &str) -> Result<bool, ValidationError> {
        Ok(contains(value, response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("200", 200, true)]
    #[case("200", 201, false)]
    #[case("200,404", 404, true)]
    #[case("500-599", 503, true)]
    #[case("500-599", 499, false)]
    #[case("301-308, 200", 200, true)]
    #[case("500-599", 599, true)]
    #[case("abc-599", 200, false)]
    #[case("5xx", 500, false)]
    #[case("abc,200", 200, true)]
    #[case("", 200, false)]
    fn membership(#[case] set: &str, #[case] status: u16, #[case] expected: bool) {
        assert_eq!(contains(set, status), expected);
    }

    #[rstest]
    #[case("200,301-308", true)]
    #[case("200,", false)]
    #[case("2x0", false)]
    #[case("100-", false)]
    fn validation(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(StatusCodeSet.validate(value).is_ok(), ok);
    }
}
