// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Matches when the final response arrived over TLS.

use crate::rules::{Check, FailIfModule, ResponseView, ValidationError};

pub struct Ssl;

impl Check for Ssl {
    fn module(&self) -> FailIfModule {
        FailIfModule::Ssl
    }

    fn matches(&self, response: &ResponseView<'_>, _value: &str) -> Result<bool, ValidationError> {
        Ok(response.used_tls)
    }
}
