// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Matches when a CEL expression over the JSON body evaluates to true.
//!
//! The parsed body is bound to the variable `body`. The expression must
//! return a boolean; any other result is an evaluation error.

use crate::rules::{Check, FailIfModule, ResponseView, ValidationError};
use cel_interpreter::{Context, Program, Value};

pub struct BodyJsonCel;

fn compile(expression: &str) -> Result<Program, ValidationError> {
    Program::compile(expression).map_err(|e| ValidationError::Cel(e.to_string()))
}

impl Check for BodyJsonCel {
    fn module(&self) -> FailIfModule {
        FailIfModule::BodyJsonCel
    }

    fn needs_body(&self) -> bool {
        true
    }

    fn validate(&self, value: &str) -> Result<(), ValidationError> {
        compile(value).map(|_| ())
    }

    fn matches(&self, response: &ResponseView<'_>, value: &str) -> Result<bool, ValidationError> {
        let body: serde_json::Value = serde_json::from_slice(response.body()?)?;
        let program = compile(value)?;

        let mut context = Context::default();
        context
            .add_variable("body", body)
            .map_err(|e| ValidationError::Cel(e.to_string()))?;

        match program
            .execute(&context)
            .map_err(|e| ValidationError::Cel(e.to_string()))?
        {
            Value::Bool(b) => Ok(b),
            other => Err(ValidationError::NotBoolean(format!("{other:?}"))),
        }
    }
}
