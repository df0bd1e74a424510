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

//! Reusable value-shape checks for schema validation.
//!
//! Each check inspects a raw value and either produces the typed result
//! or a descriptive message for the caller to wrap into a
//! `ValidationError` with the appropriate paths. Disjunctions compose
//! with [`one_of`].

use serde_json::{Map, Value};

use crate::expr;

/// A string with at least one character.
pub fn nonempty_string(value: &Value) -> Result<&str, String> {
    match value.as_str() {
        Some(text) if !text.is_empty() => Ok(text),
        Some(_) => Err("may not be an empty string".to_string()),
        None => Err("expected a string".to_string()),
    }
}

/// A mapping with at least one entry.
pub fn nonempty_mapping(value: &Value) -> Result<&Map<String, Value>, String> {
    match value.as_object() {
        Some(entries) if !entries.is_empty() => Ok(entries),
        Some(_) => Err("may not be an empty mapping".to_string()),
        None => Err("expected a mapping".to_string()),
    }
}

/// A sequence of strings with no duplicates.
pub fn unique_string_list(value: &Value) -> Result<Vec<String>, String> {
    let items = value.as_array().ok_or("expected a list of strings")?;
    let mut strings = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .as_str()
            .ok_or("expected every list element to be a string")?;
        if strings.iter().any(|existing: &String| existing == text) {
            return Err(format!("list contains duplicate entry {:?}", text));
        }
        strings.push(text.to_string());
    }
    Ok(strings)
}

/// An integer greater than or equal to one.
pub fn positive_integer(value: &Value) -> Result<u64, String> {
    match value.as_u64() {
        Some(n) if n >= 1 => Ok(n),
        _ => Err("expected a positive integer".to_string()),
    }
}

/// Either a positive integer or a string carrying an expression fragment.
pub fn expression_or_positive_integer(value: &Value) -> Result<(), String> {
    if positive_integer(value).is_ok() {
        return Ok(());
    }
    if let Some(text) = value.as_str() {
        if expr::has_fragments(text) {
            return Ok(());
        }
    }
    Err(one_of(&[
        "a positive integer".to_string(),
        "a string containing an expression".to_string(),
    ]))
}

/// A sequence whose elements are each a bare string or a single-entry
/// mapping, with all names unique across the sequence. Returns the names
/// paired with the mapped value, if any.
pub fn unique_string_or_one_key_mapping_list(
    value: &Value,
) -> Result<Vec<(String, Option<Value>)>, String> {
    let items = value
        .as_array()
        .ok_or("expected a list of names or single-entry mappings")?;
    let mut entries: Vec<(String, Option<Value>)> = Vec::with_capacity(items.len());
    for item in items {
        let (name, mapped) = match item {
            Value::String(name) if !name.is_empty() => (name.clone(), None),
            Value::Object(mapping) if mapping.len() == 1 => {
                let (name, mapped) = mapping.iter().next().expect("mapping has one entry");
                (name.clone(), Some(mapped.clone()))
            }
            _ => {
                return Err(one_of(&[
                    "a non-empty string".to_string(),
                    "a single-entry mapping".to_string(),
                ]))
            }
        };
        if entries.iter().any(|(existing, _)| *existing == name) {
            return Err(format!("list contains duplicate entry {:?}", name));
        }
        entries.push((name, mapped));
    }
    Ok(entries)
}

/// Assemble the failure message of a disjunction from the descriptions of
/// its alternatives.
pub fn one_of(alternatives: &[String]) -> String {
    format!("expected one of: {}", alternatives.join(", "))
}
