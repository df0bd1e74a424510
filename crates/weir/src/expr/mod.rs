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

//! # Expression Facade
//!
//! This module abstracts the embedded expression language used in
//! transition criteria, publish clauses, and task inputs. Text values may
//! contain sigil-delimited fragments (`<% ... %>` in the default dialect);
//! the facade locates fragments, dispatches them to a registered dialect,
//! and evaluates them against a data context with strict type
//! preservation.
//!
//! ## Key behaviors
//!
//! - A text that is exactly one fragment evaluates to the fragment's
//!   native value (number, boolean, list, mapping, null, string).
//! - A text mixing fragments with literal text evaluates every fragment,
//!   stringifies the results, and concatenates them with the literals.
//! - A fragment whose value is itself a string containing fragments is
//!   resolved recursively against the same data context; self-referential
//!   chains fail with an evaluation error.
//! - Texts without fragments evaluate to themselves.
//!
//! Dialects are pluggable: the registry selects the dialect whose sigils
//! appear in a given text. The facade does not cache; each evaluation is
//! independent.

pub mod dialect;
pub mod functions;

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::ExpressionError;
pub use dialect::PathDialect;
pub use functions::register_function;

/// A piece of a text after fragment extraction: either literal text kept
/// verbatim or the trimmed body of a sigil-delimited expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Expression(String),
}

/// Contract implemented by each expression dialect.
pub trait ExpressionDialect: Send + Sync {
    /// Identifier of the dialect.
    fn name(&self) -> &'static str;

    /// Whether the text contains at least one fragment of this dialect.
    fn has_fragments(&self, text: &str) -> bool;

    /// Split a text into literal and expression segments.
    fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>>;

    /// Check a fragment body for syntax errors without evaluating it.
    fn validate_fragment(&self, expression: &str) -> Result<(), ExpressionError>;

    /// The set of data-context names the fragment reads.
    fn extract_fragment_references(
        &self,
        expression: &str,
    ) -> Result<BTreeSet<String>, ExpressionError>;

    /// Evaluate a fragment body against the data context.
    fn evaluate_fragment(&self, expression: &str, data: &Value) -> Result<Value, ExpressionError>;
}

static DIALECT_REGISTRY: Lazy<Arc<Mutex<Vec<Arc<dyn ExpressionDialect>>>>> = Lazy::new(|| {
    let dialects: Vec<Arc<dyn ExpressionDialect>> = vec![Arc::new(PathDialect)];
    Arc::new(Mutex::new(dialects))
});

/// Register an additional dialect. Dialects are consulted in registration
/// order; the first whose sigils appear in a text handles it.
pub fn register_dialect(dialect: Arc<dyn ExpressionDialect>) {
    let mut registry = DIALECT_REGISTRY.lock().unwrap();
    registry.push(dialect);
}

fn dialect_for(text: &str) -> Option<Arc<dyn ExpressionDialect>> {
    let registry = DIALECT_REGISTRY.lock().unwrap();
    registry.iter().find(|d| d.has_fragments(text)).cloned()
}

/// Whether any registered dialect finds a fragment in the text.
pub fn has_fragments(text: &str) -> bool {
    dialect_for(text).is_some()
}

/// Wrap a bare expression in the default dialect's sigils. Text that
/// already contains a fragment is returned unchanged.
pub fn wrap(text: &str) -> String {
    if has_fragments(text) {
        text.to_string()
    } else {
        format!("{} {} {}", dialect::SIGIL_OPEN, text.trim(), dialect::SIGIL_CLOSE)
    }
}

/// Recursion guard for reference-chain resolution.
const MAX_RESOLUTION_DEPTH: usize = 64;

/// Evaluate a text against a data context.
///
/// Type preservation: if the text is exactly one fragment, the result has
/// the native type of the fragment's value. Otherwise fragments are
/// stringified and interpolated with the literal pieces. A text with no
/// fragments evaluates to itself.
pub fn evaluate(text: &str, data: &Value) -> Result<Value, ExpressionError> {
    let mut resolving = HashSet::new();
    evaluate_inner(text, data, &mut resolving, 0)
}

fn evaluate_inner(
    text: &str,
    data: &Value,
    resolving: &mut HashSet<String>,
    depth: usize,
) -> Result<Value, ExpressionError> {
    if depth > MAX_RESOLUTION_DEPTH {
        return Err(ExpressionError::evaluation(
            text,
            "reference chain exceeds the maximum resolution depth",
        ));
    }

    let dialect = match dialect_for(text) {
        Some(dialect) => dialect,
        None => return Ok(Value::String(text.to_string())),
    };

    let segments = dialect.split(text);

    if let [Segment::Expression(expression)] = segments.as_slice() {
        let value = dialect.evaluate_fragment(expression, data)?;
        return resolve_value(value, data, resolving, depth);
    }

    let mut output = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(literal) => output.push_str(literal),
            Segment::Expression(expression) => {
                let value = dialect.evaluate_fragment(&expression, data)?;
                let value = resolve_value(value, data, resolving, depth)?;
                output.push_str(&stringify(&value));
            }
        }
    }
    Ok(Value::String(output))
}

/// Resolve a fragment value that may itself be a string containing
/// fragments. The `resolving` set tracks the chain of texts currently
/// being resolved so self-reference fails instead of recursing forever.
fn resolve_value(
    value: Value,
    data: &Value,
    resolving: &mut HashSet<String>,
    depth: usize,
) -> Result<Value, ExpressionError> {
    if let Value::String(text) = &value {
        if has_fragments(text) {
            if resolving.contains(text) {
                return Err(ExpressionError::evaluation(text, "circular expression reference"));
            }
            resolving.insert(text.clone());
            let resolved = evaluate_inner(text, data, resolving, depth + 1);
            resolving.remove(text);
            return resolved;
        }
    }
    Ok(value)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// The set of data-context names a text reads, across all of its
/// fragments. Texts without fragments read nothing.
pub fn extract_references(text: &str) -> Result<BTreeSet<String>, ExpressionError> {
    let mut references = BTreeSet::new();
    if let Some(dialect) = dialect_for(text) {
        for segment in dialect.split(text) {
            if let Segment::Expression(expression) = segment {
                references.append(&mut dialect.extract_fragment_references(&expression)?);
            }
        }
    }
    Ok(references)
}

/// Syntax-check every fragment in a text.
pub fn validate_syntax(text: &str) -> Result<(), ExpressionError> {
    if let Some(dialect) = dialect_for(text) {
        for segment in dialect.split(text) {
            if let Segment::Expression(expression) = segment {
                dialect.validate_fragment(&expression)?;
            }
        }
    }
    Ok(())
}

/// Collect references from every string leaf of an arbitrary value tree.
/// Unparseable fragments contribute nothing here; syntax errors are
/// reported separately by the inspection pass.
pub fn extract_references_from_value(value: &Value) -> BTreeSet<String> {
    let mut references = BTreeSet::new();
    collect_value_references(value, &mut references);
    references
}

fn collect_value_references(value: &Value, references: &mut BTreeSet<String>) {
    match value {
        Value::String(text) => {
            if let Ok(mut found) = extract_references(text) {
                references.append(&mut found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_value_references(item, references);
            }
        }
        Value::Object(entries) => {
            for item in entries.values() {
                collect_value_references(item, references);
            }
        }
        _ => {}
    }
}
