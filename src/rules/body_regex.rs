// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Matches when the body contains a match for the pattern.

use crate::rules::{Check, FailIfModule, ResponseView, ValidationError};
use regex::bytes::Regex;

pub struct BodyRegex;

impl Check for BodyRegex {
    fn module(&self) -> FailIfModule {
        FailIfModule::BodyRegex
    }

    fn needs_body(&self) -> bool {
        true
    }

    fn validate(&self, value: &str) -> Result<(), ValidationError> {
        Regex::new(value)?;
        Ok(())
    }

    fn matches(&self, response: &ResponseView<'_>, value: &str) -> Result<bool, ValidationError> {
        let re = Regex::new(value)?;
        Ok(re.is_match(response.body()?))
    }
}
