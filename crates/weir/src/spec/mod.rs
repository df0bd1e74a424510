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

//! # Spec Framework
//!
//! Shared machinery for schema-validated workflow records. Validation
//! passes accumulate [`ValidationError`] records instead of bailing at the
//! first problem, each carrying a dotted `spec_path` into the definition
//! and a JSON-Schema-style `schema_path`.
//!
//! Context validation walks a spec with a [`SpecParent`] carrying the set
//! of variable names in scope at that program point; expressions may only
//! reference names already in the set, and fields that publish names
//! contribute them to the caller's downstream context.

pub mod constraints;
pub mod workflow;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::ValidationError;
use crate::expr;

/// The caller's accumulated validation state handed to a child spec.
#[derive(Debug, Clone, Default)]
pub struct SpecParent {
    /// Variable names in scope at this program point.
    pub ctx: BTreeSet<String>,
    /// Dotted path to the child within the definition.
    pub spec_path: String,
    /// JSON-Schema-style path to the child's schema.
    pub schema_path: String,
}

/// Join a dotted path segment onto a possibly-empty base path.
pub fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", base, segment)
    }
}

/// Check every expression reference in a value tree against the context,
/// appending an error for each name not in scope.
pub fn check_references(
    value: &Value,
    ctx: &BTreeSet<String>,
    spec_path: &str,
    schema_path: &str,
    errors: &mut Vec<ValidationError>,
) {
    for name in expr::extract_references_from_value(value) {
        if !ctx.contains(&name) {
            errors.push(undefined_reference(&name, spec_path, schema_path));
        }
    }
}

/// Check the expression references of a single text against the context.
pub fn check_text_references(
    text: &str,
    ctx: &BTreeSet<String>,
    spec_path: &str,
    schema_path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if let Ok(references) = expr::extract_references(text) {
        for name in references {
            if !ctx.contains(&name) {
                errors.push(undefined_reference(&name, spec_path, schema_path));
            }
        }
    }
}

fn undefined_reference(name: &str, spec_path: &str, schema_path: &str) -> ValidationError {
    ValidationError::new(
        format!("variable \"{}\" is referenced before assignment", name),
        spec_path,
        schema_path,
    )
}

/// Check every fragment in a value tree for syntax errors.
pub fn check_syntax(
    value: &Value,
    spec_path: &str,
    schema_path: &str,
    errors: &mut Vec<ValidationError>,
) {
    match value {
        Value::String(text) => {
            if let Err(error) = expr::validate_syntax(text) {
                errors.push(ValidationError::new(error.to_string(), spec_path, schema_path));
            }
        }
        Value::Array(items) => {
            for item in items {
                check_syntax(item, spec_path, schema_path, errors);
            }
        }
        Value::Object(entries) => {
            for item in entries.values() {
                check_syntax(item, spec_path, schema_path, errors);
            }
        }
        _ => {}
    }
}

/// Check a single text for fragment syntax errors.
pub fn check_text_syntax(
    text: &str,
    spec_path: &str,
    schema_path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if let Err(error) = expr::validate_syntax(text) {
        errors.push(ValidationError::new(error.to_string(), spec_path, schema_path));
    }
}
