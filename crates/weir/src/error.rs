/*
 *  Copyright 2025 Weir Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Error types for workflow validation, expression handling, and graph
//! composition.
//!
//! Two propagation policies coexist here. Validation passes *accumulate*
//! [`ValidationError`] records and return them as a list so tooling can
//! surface everything wrong with a workflow in one pass. Evaluation paths
//! (the expression facade, the composer) fail fast with a typed error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single validation finding, carrying enough location information for
/// tools to highlight the offending region of the definition.
///
/// # Fields
///
/// * `message`: Human-readable description of the violation
/// * `spec_path`: Dotted path into the workflow definition (e.g.
///   `tasks.task1.next[0].publish`)
/// * `schema_path`: JSON-Schema-style path into the schema that was
///   violated (e.g. `properties.tasks.patternProperties.^\w+$`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    pub spec_path: String,
    pub schema_path: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, spec_path: &str, schema_path: &str) -> Self {
        Self {
            message: message.into(),
            spec_path: spec_path.to_string(),
            schema_path: schema_path.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.message, self.spec_path)
    }
}

/// Errors raised while constructing a workflow spec from a raw definition.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The definition violates the declared schema. Every violation found
    /// during the pass is listed, not just the first.
    #[error("workflow definition failed schema validation with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    /// The serialized definition could not be parsed into structured data.
    #[error("failed to parse workflow definition: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl SpecError {
    /// The accumulated validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            SpecError::Validation(errors) => errors,
            SpecError::Parse(_) => &[],
        }
    }
}

/// Errors raised by the expression facade.
///
/// Syntax errors are also reported (as accumulated [`ValidationError`]s)
/// by `WorkflowSpec::inspect`; the typed variants here are raised when an
/// expression is parsed or evaluated directly.
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// The expression fragment could not be parsed.
    #[error("syntax error in expression {expression:?}: {message}")]
    Syntax { expression: String, message: String },

    /// The expression failed at evaluation time: an undefined reference, a
    /// function failure, or a non-terminating reference chain.
    #[error("unable to evaluate expression {expression:?}: {message}")]
    Evaluation { expression: String, message: String },
}

impl ExpressionError {
    pub fn syntax(expression: &str, message: impl Into<String>) -> Self {
        Self::Syntax {
            expression: expression.to_string(),
            message: message.into(),
        }
    }

    pub fn evaluation(expression: &str, message: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised by registered expression functions.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("expected {expected} argument(s), got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors raised while composing a validated spec into a graph.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A transition's `do` names a task not present in `tasks`.
    #[error("task {task:?} transitions to unknown task {target:?}")]
    UnknownTask { task: String, target: String },
}
