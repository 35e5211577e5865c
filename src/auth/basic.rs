// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

use super::{AuthError, AuthStrategy};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hyper::header::{HeaderValue, AUTHORIZATION};
use hyper::HeaderMap;

#[derive(Clone)]
pub struct BasicAuth {
    id: String,
    password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl BasicAuth {
    pub fn new(id: &str, password: &str) -> Self {
        Self {
            id: id.to_string(),
            password: password.to_string(),
        }
    }
}

impl AuthStrategy for BasicAuth {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn init(&mut self) -> Result<(), AuthError> {
        if self.id.is_empty() && self.password.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }
        Ok(())
    }

    fn issue(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        let encoded = STANDARD.encode(format!("{}:{}", self.id, self.password));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}"))?,
        );
        Ok(())
    }
}
