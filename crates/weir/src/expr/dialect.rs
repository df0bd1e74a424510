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

//! The default expression dialect.
//!
//! Fragments are wrapped in `<% ... %>` sigils. Inside a fragment the
//! grammar supports data-context paths (`$.a.b`, bare `$` for the whole
//! context), string/number/boolean/null literals, function calls over the
//! shared function registry, comparisons (`=`, `!=`, `<`, `<=`, `>`,
//! `>=`), and `and`/`or`/`not`. Bare identifiers evaluate to their own
//! name as a string, which keeps criteria such as
//! `task_state(task1) = "SUCCESS"` parseable without quoting.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::functions::lookup_function;
use super::{ExpressionDialect, Segment};
use crate::error::ExpressionError;

/// Opening sigil of the default dialect.
pub const SIGIL_OPEN: &str = "<%";
/// Closing sigil of the default dialect.
pub const SIGIL_CLOSE: &str = "%>";

static FRAGMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<%(.*?)%>").expect("fragment regex is valid"));

/// The built-in `<% ... %>` dialect registered by default.
#[derive(Debug, Default)]
pub struct PathDialect;

impl ExpressionDialect for PathDialect {
    fn name(&self) -> &'static str {
        "path"
    }

    fn has_fragments(&self, text: &str) -> bool {
        FRAGMENT_REGEX.is_match(text)
    }

    fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for found in FRAGMENT_REGEX.captures_iter(text) {
            let whole = found.get(0).expect("regex match has a whole capture");
            if whole.start() > cursor {
                segments.push(Segment::Literal(&text[cursor..whole.start()]));
            }
            let inner = found.get(1).expect("fragment regex has one group");
            segments.push(Segment::Expression(inner.as_str().trim().to_string()));
            cursor = whole.end();
        }

        if cursor < text.len() {
            segments.push(Segment::Literal(&text[cursor..]));
        }

        segments
    }

    fn validate_fragment(&self, expression: &str) -> Result<(), ExpressionError> {
        parse(expression)
            .map(|_| ())
            .map_err(|message| ExpressionError::syntax(expression, message))
    }

    fn extract_fragment_references(
        &self,
        expression: &str,
    ) -> Result<BTreeSet<String>, ExpressionError> {
        let ast = parse(expression).map_err(|message| ExpressionError::syntax(expression, message))?;
        let mut references = BTreeSet::new();
        collect_references(&ast, &mut references);
        Ok(references)
    }

    fn evaluate_fragment(&self, expression: &str, data: &Value) -> Result<Value, ExpressionError> {
        let ast = parse(expression).map_err(|message| ExpressionError::syntax(expression, message))?;
        evaluate_ast(&ast, data).map_err(|message| ExpressionError::evaluation(expression, message))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dollar,
    Dot,
    Comma,
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    True,
    False,
    Null,
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    /// `$.a.b`; an empty segment list is the whole data context.
    Path(Vec<String>),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// A bare identifier, evaluated as its own name.
    Ident(String),
    Call { name: String, args: Vec<Ast> },
    Not(Box<Ast>),
    Binary { op: BinaryOp, lhs: Box<Ast>, rhs: Box<Ast> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '$' => {
                chars.next();
                tokens.push(Token::Dollar);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    return Err("unexpected character '!'".to_string());
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    if ch == '\\' {
                        match chars.next() {
                            Some(escaped) => literal.push(escaped),
                            None => return Err("unterminated escape sequence".to_string()),
                        }
                    } else if ch == quote {
                        closed = true;
                        break;
                    } else {
                        literal.push(ch);
                    }
                }
                if !closed {
                    return Err("unterminated string literal".to_string());
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let mut number = String::new();
                number.push(c);
                if c == '-' && !chars.peek().map_or(false, |d| d.is_ascii_digit()) {
                    return Err("unexpected character '-'".to_string());
                }
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        number.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        // Only consume the dot if a digit follows; `1.` is
                        // rejected rather than read as a path separator.
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if lookahead.peek().map_or(false, |e| e.is_ascii_digit()) {
                            is_float = true;
                            number.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let value = number
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number {:?}", number))?;
                    tokens.push(Token::Float(value));
                } else {
                    let value = number
                        .parse::<i64>()
                        .map_err(|_| format!("invalid number {:?}", number))?;
                    tokens.push(Token::Int(value));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            other => return Err(format!("unexpected character {:?}", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == *expected => Ok(()),
            Some(token) => Err(format!("expected {:?}, found {:?}", expected, token)),
            None => Err(format!("expected {:?}, found end of expression", expected)),
        }
    }

    fn parse_or(&mut self) -> Result<Ast, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Ast::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Ast, String> {
        let mut lhs = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_not()?;
            lhs = Ast::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Ast, String> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let operand = self.parse_not()?;
            return Ok(Ast::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Ast, String> {
        let lhs = self.parse_primary()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.next();
        let rhs = self.parse_primary()?;
        Ok(Ast::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_primary(&mut self) -> Result<Ast, String> {
        match self.next() {
            Some(Token::Dollar) => {
                let mut segments = Vec::new();
                while self.peek() == Some(&Token::Dot) {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(name)) => segments.push(name),
                        Some(token) => {
                            return Err(format!("expected a name after '.', found {:?}", token))
                        }
                        None => return Err("expected a name after '.'".to_string()),
                    }
                }
                Ok(Ast::Path(segments))
            }
            Some(Token::Str(literal)) => Ok(Ast::Str(literal)),
            Some(Token::Int(value)) => Ok(Ast::Int(value)),
            Some(Token::Float(value)) => Ok(Ast::Float(value)),
            Some(Token::True) => Ok(Ast::Bool(true)),
            Some(Token::False) => Ok(Ast::Bool(false)),
            Some(Token::Null) => Ok(Ast::Null),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.next();
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.next();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Ast::Call { name, args })
                } else {
                    Ok(Ast::Ident(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("empty expression".to_string()),
        }
    }
}

fn parse(expression: &str) -> Result<Ast, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let ast = parser.parse_or()?;
    match parser.peek() {
        Some(token) => Err(format!("unexpected trailing token {:?}", token)),
        None => Ok(ast),
    }
}

fn collect_references(ast: &Ast, references: &mut BTreeSet<String>) {
    match ast {
        Ast::Path(segments) => {
            if let Some(root) = segments.first() {
                references.insert(root.clone());
            }
        }
        Ast::Call { args, .. } => {
            for arg in args {
                collect_references(arg, references);
            }
        }
        Ast::Not(operand) => collect_references(operand, references),
        Ast::Binary { lhs, rhs, .. } => {
            collect_references(lhs, references);
            collect_references(rhs, references);
        }
        _ => {}
    }
}

fn evaluate_ast(ast: &Ast, data: &Value) -> Result<Value, String> {
    match ast {
        Ast::Path(segments) => {
            let mut current = data;
            for (i, segment) in segments.iter().enumerate() {
                match current.get(segment) {
                    Some(next) => current = next,
                    None => {
                        let path = segments[..=i].join(".");
                        return Err(format!("\"$.{}\" is undefined", path));
                    }
                }
            }
            Ok(current.clone())
        }
        Ast::Str(literal) => Ok(Value::String(literal.clone())),
        Ast::Int(value) => Ok(Value::from(*value)),
        Ast::Float(value) => serde_json::Number::from_f64(*value)
            .map(Value::Number)
            .ok_or_else(|| format!("{} is not a representable number", value)),
        Ast::Bool(value) => Ok(Value::Bool(*value)),
        Ast::Null => Ok(Value::Null),
        Ast::Ident(name) => Ok(Value::String(name.clone())),
        Ast::Call { name, args } => {
            let function =
                lookup_function(name).ok_or_else(|| format!("unknown function {:?}", name))?;
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate_ast(arg, data)?);
            }
            function(&evaluated).map_err(|e| format!("function {:?} failed: {}", name, e))
        }
        Ast::Not(operand) => match evaluate_ast(operand, data)? {
            Value::Bool(value) => Ok(Value::Bool(!value)),
            other => Err(format!("'not' expects a boolean, got {}", other)),
        },
        Ast::Binary { op, lhs, rhs } => {
            let left = evaluate_ast(lhs, data)?;
            match op {
                BinaryOp::And | BinaryOp::Or => {
                    let left = as_bool(&left)?;
                    // Short-circuit evaluation.
                    if *op == BinaryOp::And && !left {
                        return Ok(Value::Bool(false));
                    }
                    if *op == BinaryOp::Or && left {
                        return Ok(Value::Bool(true));
                    }
                    let right = as_bool(&evaluate_ast(rhs, data)?)?;
                    Ok(Value::Bool(right))
                }
                BinaryOp::Eq => Ok(Value::Bool(left == evaluate_ast(rhs, data)?)),
                BinaryOp::Ne => Ok(Value::Bool(left != evaluate_ast(rhs, data)?)),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    let right = evaluate_ast(rhs, data)?;
                    let ordering = compare(&left, &right)?;
                    let result = match op {
                        BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
                        BinaryOp::Le => ordering != std::cmp::Ordering::Greater,
                        BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
                        BinaryOp::Ge => ordering != std::cmp::Ordering::Less,
                        _ => unreachable!(),
                    };
                    Ok(Value::Bool(result))
                }
            }
        }
    }
}

fn as_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(format!("expected a boolean, got {}", other)),
    }
}

fn compare(left: &Value, right: &Value) -> Result<std::cmp::Ordering, String> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().ok_or("number is not comparable")?;
            let b = b.as_f64().ok_or("number is not comparable")?;
            a.partial_cmp(&b).ok_or_else(|| "numbers are not comparable".to_string())
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (a, b) => Err(format!("cannot compare {} with {}", a, b)),
    }
}
