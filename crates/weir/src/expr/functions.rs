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

//! Registry of functions callable from expression fragments.
//!
//! The registry is global and shared by all dialects. Two functions are
//! built in: `json(s)` parses a JSON string into a value, and `int(x)`
//! coerces a number or numeric string into an integer. Embedders may
//! register additional pure functions with [`register_function`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::error::FunctionError;

/// Signature of a registered expression function.
pub type ExpressionFunction = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

static FUNCTION_REGISTRY: Lazy<Arc<Mutex<HashMap<String, ExpressionFunction>>>> =
    Lazy::new(|| {
        let mut functions: HashMap<String, ExpressionFunction> = HashMap::new();
        functions.insert("json".to_string(), Arc::new(json_function));
        functions.insert("int".to_string(), Arc::new(int_function));
        Arc::new(Mutex::new(functions))
    });

/// Register a function under the given name, replacing any previous
/// registration. Functions must be pure: they are called during criteria
/// evaluation and must not perform I/O.
pub fn register_function<F>(name: &str, function: F)
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    let mut registry = FUNCTION_REGISTRY.lock().unwrap();
    registry.insert(name.to_string(), Arc::new(function));
}

/// Look up a registered function by name.
pub fn lookup_function(name: &str) -> Option<ExpressionFunction> {
    let registry = FUNCTION_REGISTRY.lock().unwrap();
    registry.get(name).cloned()
}

fn expect_one(args: &[Value]) -> Result<&Value, FunctionError> {
    if args.len() != 1 {
        return Err(FunctionError::WrongArity {
            expected: 1,
            got: args.len(),
        });
    }
    Ok(&args[0])
}

/// `json(s)`: parse a JSON document out of a string value.
fn json_function(args: &[Value]) -> Result<Value, FunctionError> {
    match expect_one(args)? {
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| FunctionError::InvalidArgument(format!("not a valid JSON document: {}", e))),
        other => Err(FunctionError::InvalidArgument(format!(
            "expected a JSON string, got {}",
            type_name(other)
        ))),
    }
}

/// `int(x)`: coerce a number or numeric string to an integer.
fn int_function(args: &[Value]) -> Result<Value, FunctionError> {
    match expect_one(args)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::from(f.trunc() as i64))
            } else {
                Err(FunctionError::InvalidArgument(format!(
                    "{} is out of integer range",
                    n
                )))
            }
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| FunctionError::InvalidArgument(format!("{:?} is not an integer", text))),
        other => Err(FunctionError::InvalidArgument(format!(
            "cannot coerce {} to an integer",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
