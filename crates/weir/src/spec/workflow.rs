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

//! # Workflow Specification Model
//!
//! This module provides the typed workflow definition model and the
//! traversals over it: schema validation from raw structured data, graph
//! queries (next/previous tasks, start tasks, join and split
//! classification, cycle detection), and breadth-first context validation
//! that propagates the set of in-scope variable names along transitions.
//!
//! ## Core Types
//!
//! - `WorkflowSpec`: the root record (`input`, `vars`, `output`, `tasks`)
//! - `TaskMappingSpec`: mapping from task name to `TaskSpec`
//! - `TaskSpec`: a unit of work with optional transitions
//! - `TaskTransitionSpec`: a conditional edge to downstream tasks
//! - `ItemizedSpec`: iteration description (`items`, `concurrency`)
//!
//! A spec is constructed from a raw definition, validated once, and
//! treated as immutable afterwards.

use std::collections::{BTreeSet, HashMap, VecDeque};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::constraints;
use super::{
    check_references, check_syntax, check_text_references, check_text_syntax, join_path,
    SpecParent,
};
use crate::error::{SpecError, ValidationError};

/// Pattern every task name must match.
pub const TASK_NAME_PATTERN: &str = r"^\w+$";

static TASK_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(TASK_NAME_PATTERN).expect("task name regex is valid"));

/// A declared workflow input parameter: a bare name or a name with a
/// default-value expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputParameterSpec {
    name: String,
    default: Option<Value>,
}

impl InputParameterSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// A field accepting either a single string or a unique list of strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StringOrList {
    Inline(String),
    List(Vec<String>),
}

impl StringOrList {
    /// The individual names. The inline form is comma-split with each
    /// token trimmed; empty tokens are dropped.
    pub fn names(&self) -> Vec<String> {
        match self {
            StringOrList::Inline(text) => text
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
            StringOrList::List(items) => items.clone(),
        }
    }

    fn texts(&self) -> Vec<&str> {
        match self {
            StringOrList::Inline(text) => vec![text.as_str()],
            StringOrList::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// Variables a transition contributes to downstream context: a single
/// expression or a mapping from name to expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PublishSpec {
    Expression(String),
    Mapping(IndexMap<String, Value>),
}

impl PublishSpec {
    /// The statically-knowable names this publish contributes. Only the
    /// mapping form names its variables.
    pub fn names(&self) -> Vec<String> {
        match self {
            PublishSpec::Expression(_) => Vec::new(),
            PublishSpec::Mapping(entries) => entries.keys().cloned().collect(),
        }
    }
}

/// Barrier threshold of a join task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JoinSpec {
    /// Wait for every incoming branch.
    All,
    /// Wait for the given number of incoming branches.
    Count(u64),
}

/// Concurrency bound of an itemized task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConcurrencySpec {
    Expression(String),
    Count(u64),
}

/// Iteration description of a task (`with`).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ItemizedSpec {
    items: Option<StringOrList>,
    concurrency: Option<ConcurrencySpec>,
}

impl ItemizedSpec {
    pub fn items(&self) -> Option<&StringOrList> {
        self.items.as_ref()
    }

    pub fn concurrency(&self) -> Option<&ConcurrencySpec> {
        self.concurrency.as_ref()
    }

    fn from_value(
        value: &Value,
        spec_path: &str,
        schema_path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Self {
        let mut spec = ItemizedSpec::default();
        let Some(entries) = value.as_object() else {
            errors.push(ValidationError::new("expected a mapping", spec_path, schema_path));
            return spec;
        };

        if let Some(items) = entries.get("items") {
            match string_or_unique_string_list(items) {
                Ok(parsed) => spec.items = Some(parsed),
                Err(message) => errors.push(ValidationError::new(
                    message,
                    &join_path(spec_path, "items"),
                    &format!("{}.properties.items", schema_path),
                )),
            }
        }

        if let Some(concurrency) = entries.get("concurrency") {
            match constraints::expression_or_positive_integer(concurrency) {
                Ok(()) => {
                    spec.concurrency = Some(match concurrency {
                        Value::String(text) => ConcurrencySpec::Expression(text.clone()),
                        other => ConcurrencySpec::Count(
                            other.as_u64().expect("checked as positive integer"),
                        ),
                    });
                }
                Err(message) => errors.push(ValidationError::new(
                    message,
                    &join_path(spec_path, "concurrency"),
                    &format!("{}.properties.concurrency", schema_path),
                )),
            }
        }

        spec
    }
}

/// A conditional transition from one task to zero or more successors.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TaskTransitionSpec {
    when: Option<String>,
    publish: Option<PublishSpec>,
    #[serde(rename = "do")]
    do_targets: Option<StringOrList>,
}

impl TaskTransitionSpec {
    pub fn when(&self) -> Option<&str> {
        self.when.as_deref()
    }

    pub fn publish(&self) -> Option<&PublishSpec> {
        self.publish.as_ref()
    }

    pub fn do_targets(&self) -> Option<&StringOrList> {
        self.do_targets.as_ref()
    }

    /// Downstream task names of this transition, comma-split and trimmed
    /// for the inline form. Empty when `do` is absent.
    pub fn next_task_names(&self) -> Vec<String> {
        self.do_targets
            .as_ref()
            .map(StringOrList::names)
            .unwrap_or_default()
    }

    fn from_value(
        value: &Value,
        spec_path: &str,
        schema_path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Self {
        let mut spec = TaskTransitionSpec::default();
        let Some(entries) = value.as_object() else {
            errors.push(ValidationError::new("expected a mapping", spec_path, schema_path));
            return spec;
        };

        for key in entries.keys() {
            if !matches!(key.as_str(), "when" | "publish" | "do") {
                errors.push(ValidationError::new(
                    format!("additional property {:?} is not allowed", key),
                    &join_path(spec_path, key),
                    &format!("{}.additionalProperties", schema_path),
                ));
            }
        }

        if let Some(when) = entries.get("when") {
            match constraints::nonempty_string(when) {
                Ok(text) => spec.when = Some(text.to_string()),
                Err(message) => errors.push(ValidationError::new(
                    message,
                    &join_path(spec_path, "when"),
                    &format!("{}.properties.when", schema_path),
                )),
            }
        }

        if let Some(publish) = entries.get("publish") {
            match publish {
                Value::String(_) => match constraints::nonempty_string(publish) {
                    Ok(text) => spec.publish = Some(PublishSpec::Expression(text.to_string())),
                    Err(message) => errors.push(ValidationError::new(
                        message,
                        &join_path(spec_path, "publish"),
                        &format!("{}.properties.publish", schema_path),
                    )),
                },
                _ => match constraints::nonempty_mapping(publish) {
                    Ok(entries) => {
                        spec.publish = Some(PublishSpec::Mapping(
                            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                        ));
                    }
                    Err(_) => errors.push(ValidationError::new(
                        constraints::one_of(&[
                            "a non-empty string".to_string(),
                            "a non-empty mapping".to_string(),
                        ]),
                        &join_path(spec_path, "publish"),
                        &format!("{}.properties.publish", schema_path),
                    )),
                },
            }
        }

        if let Some(do_value) = entries.get("do") {
            match string_or_unique_string_list(do_value) {
                Ok(parsed) => spec.do_targets = Some(parsed),
                Err(message) => errors.push(ValidationError::new(
                    message,
                    &join_path(spec_path, "do"),
                    &format!("{}.properties.do", schema_path),
                )),
            }
        }

        spec
    }

    /// Validate references in context-evaluation order (`when`, `publish`,
    /// `do`) and return the names this transition publishes downstream.
    fn validate_context(&self, parent: &SpecParent) -> (Vec<ValidationError>, BTreeSet<String>) {
        let mut errors = Vec::new();
        let mut published = BTreeSet::new();

        if let Some(when) = &self.when {
            check_text_references(
                when,
                &parent.ctx,
                &join_path(&parent.spec_path, "when"),
                &format!("{}.properties.when", parent.schema_path),
                &mut errors,
            );
        }

        match &self.publish {
            Some(PublishSpec::Expression(text)) => {
                check_text_references(
                    text,
                    &parent.ctx,
                    &join_path(&parent.spec_path, "publish"),
                    &format!("{}.properties.publish", parent.schema_path),
                    &mut errors,
                );
            }
            Some(PublishSpec::Mapping(entries)) => {
                for (name, value) in entries {
                    check_references(
                        value,
                        &parent.ctx,
                        &join_path(&parent.spec_path, &format!("publish.{}", name)),
                        &format!("{}.properties.publish", parent.schema_path),
                        &mut errors,
                    );
                }
                published.extend(entries.keys().cloned());
            }
            None => {}
        }

        if let Some(do_targets) = &self.do_targets {
            for text in do_targets.texts() {
                check_text_references(
                    text,
                    &parent.ctx,
                    &join_path(&parent.spec_path, "do"),
                    &format!("{}.properties.do", parent.schema_path),
                    &mut errors,
                );
            }
        }

        (errors, published)
    }
}

/// A unit of work within a workflow.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TaskSpec {
    action: Option<String>,
    input: Option<IndexMap<String, Value>>,
    with: Option<ItemizedSpec>,
    join: Option<JoinSpec>,
    next: Vec<TaskTransitionSpec>,
}

impl TaskSpec {
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn input(&self) -> Option<&IndexMap<String, Value>> {
        self.input.as_ref()
    }

    pub fn with(&self) -> Option<&ItemizedSpec> {
        self.with.as_ref()
    }

    pub fn join(&self) -> Option<JoinSpec> {
        self.join
    }

    pub fn next(&self) -> &[TaskTransitionSpec] {
        &self.next
    }

    /// Whether this task is a join (barrier) task.
    pub fn has_join(&self) -> bool {
        self.join.is_some()
    }

    fn from_value(
        value: &Value,
        spec_path: &str,
        schema_path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Self {
        let mut spec = TaskSpec::default();
        let Some(entries) = value.as_object() else {
            errors.push(ValidationError::new(
                "expected a mapping of task properties",
                spec_path,
                schema_path,
            ));
            return spec;
        };

        for key in entries.keys() {
            if !matches!(key.as_str(), "action" | "input" | "with" | "join" | "next") {
                errors.push(ValidationError::new(
                    format!("additional property {:?} is not allowed", key),
                    &join_path(spec_path, key),
                    &format!("{}.additionalProperties", schema_path),
                ));
            }
        }

        if let Some(action) = entries.get("action") {
            match constraints::nonempty_string(action) {
                Ok(text) => spec.action = Some(text.to_string()),
                Err(message) => errors.push(ValidationError::new(
                    message,
                    &join_path(spec_path, "action"),
                    &format!("{}.properties.action", schema_path),
                )),
            }
        }

        if let Some(input) = entries.get("input") {
            match constraints::nonempty_mapping(input) {
                Ok(mapping) => {
                    spec.input =
                        Some(mapping.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
                }
                Err(message) => errors.push(ValidationError::new(
                    message,
                    &join_path(spec_path, "input"),
                    &format!("{}.properties.input", schema_path),
                )),
            }
        }

        if let Some(with) = entries.get("with") {
            spec.with = Some(ItemizedSpec::from_value(
                with,
                &join_path(spec_path, "with"),
                &format!("{}.properties.with", schema_path),
                errors,
            ));
        }

        if let Some(join) = entries.get("join") {
            if join.as_str() == Some("all") {
                spec.join = Some(JoinSpec::All);
            } else {
                match constraints::positive_integer(join) {
                    Ok(count) => spec.join = Some(JoinSpec::Count(count)),
                    Err(_) => errors.push(ValidationError::new(
                        constraints::one_of(&[
                            "the literal \"all\"".to_string(),
                            "a positive integer".to_string(),
                        ]),
                        &join_path(spec_path, "join"),
                        &format!("{}.properties.join", schema_path),
                    )),
                }
            }
        }

        if let Some(next) = entries.get("next") {
            match next.as_array() {
                Some(transitions) => {
                    for (i, transition) in transitions.iter().enumerate() {
                        spec.next.push(TaskTransitionSpec::from_value(
                            transition,
                            &format!("{}.next[{}]", spec_path, i),
                            &format!("{}.properties.next.items", schema_path),
                            errors,
                        ));
                    }
                }
                None => errors.push(ValidationError::new(
                    "expected a list of transitions",
                    &join_path(spec_path, "next"),
                    &format!("{}.properties.next", schema_path),
                )),
            }
        }

        spec
    }

    /// Validate references in context-evaluation order (`action`,
    /// `input`). Transitions are validated per-branch by the mapping walk
    /// so that each branch sees its own context.
    fn validate_context(&self, parent: &SpecParent) -> (Vec<ValidationError>, BTreeSet<String>) {
        let mut errors = Vec::new();

        if let Some(action) = &self.action {
            check_text_references(
                action,
                &parent.ctx,
                &join_path(&parent.spec_path, "action"),
                &format!("{}.properties.action", parent.schema_path),
                &mut errors,
            );
        }

        if let Some(input) = &self.input {
            for (name, value) in input {
                check_references(
                    value,
                    &parent.ctx,
                    &join_path(&parent.spec_path, &format!("input.{}", name)),
                    &format!("{}.properties.input", parent.schema_path),
                    &mut errors,
                );
            }
        }

        (errors, BTreeSet::new())
    }
}

/// Mapping from task name to task spec, preserving declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TaskMappingSpec {
    tasks: IndexMap<String, TaskSpec>,
}

impl TaskMappingSpec {
    /// Look up a task by name.
    pub fn get_task(&self, task_name: &str) -> Option<&TaskSpec> {
        self.tasks.get(task_name)
    }

    /// Task names in declaration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Iterate tasks in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskSpec)> {
        self.tasks.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Every `(next_task_name, condition)` pair emanating from the task,
    /// sorted lexicographically by target name (ties keep declaration
    /// order). Inline `do` strings are comma-split and trimmed.
    pub fn get_next_tasks(&self, task_name: &str) -> Vec<(String, Option<String>)> {
        let mut next_tasks = Vec::new();

        if let Some(task_spec) = self.tasks.get(task_name) {
            for transition in &task_spec.next {
                let condition = transition.when.clone();
                for target in transition.next_task_names() {
                    next_tasks.push((target, condition.clone()));
                }
            }
        }

        next_tasks.sort_by(|a, b| a.0.cmp(&b.0));
        next_tasks
    }

    /// Every `(prev_task_name, condition)` pair leading into the task,
    /// sorted lexicographically by source name. O(T * E) over the mapping.
    pub fn get_prev_tasks(&self, task_name: &str) -> Vec<(String, Option<String>)> {
        let mut prev_tasks = Vec::new();

        for name in self.tasks.keys() {
            for (target, condition) in self.get_next_tasks(name) {
                if target == task_name {
                    prev_tasks.push((name.clone(), condition));
                }
            }
        }

        prev_tasks.sort_by(|a, b| a.0.cmp(&b.0));
        prev_tasks
    }

    /// Tasks with no predecessor, sorted lexicographically.
    pub fn get_start_tasks(&self) -> Vec<(String, Option<String>)> {
        let mut start_tasks: Vec<(String, Option<String>)> = self
            .tasks
            .keys()
            .filter(|name| self.get_prev_tasks(name).is_empty())
            .map(|name| (name.clone(), None))
            .collect();

        start_tasks.sort_by(|a, b| a.0.cmp(&b.0));
        start_tasks
    }

    /// Whether the task declares a join barrier.
    pub fn is_join_task(&self, task_name: &str) -> bool {
        self.tasks
            .get(task_name)
            .map(TaskSpec::has_join)
            .unwrap_or(false)
    }

    /// Whether the task has multiple predecessors without declaring a
    /// join. Mutually exclusive with [`is_join_task`](Self::is_join_task).
    pub fn is_split_task(&self, task_name: &str) -> bool {
        !self.is_join_task(task_name) && self.get_prev_tasks(task_name).len() > 1
    }

    /// Breadth-first walk from the task looking for a path back to it.
    ///
    /// The walk stops exploring any node it has already seen, so this
    /// reports cycles *containing* the query task, not cycles merely
    /// reachable from it.
    pub fn in_cycle(&self, task_name: &str) -> bool {
        let mut traversed: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for (next_task_name, _) in self.get_next_tasks(task_name) {
            queue.push_back(next_task_name);
        }

        while let Some(next_task_name) = queue.pop_front() {
            if next_task_name == task_name {
                return true;
            }

            if traversed.contains(&next_task_name) {
                continue;
            }

            for (target, _) in self.get_next_tasks(&next_task_name) {
                queue.push_back(target);
            }

            traversed.insert(next_task_name);
        }

        false
    }

    /// Whether any task sits on a cycle.
    pub fn has_cycles(&self) -> bool {
        self.tasks.keys().any(|task_name| self.in_cycle(task_name))
    }

    fn from_value(
        value: &Value,
        spec_path: &str,
        schema_path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Self {
        let mut spec = TaskMappingSpec::default();
        let Some(entries) = value.as_object() else {
            errors.push(ValidationError::new(
                "expected a mapping of task names to task specifications",
                spec_path,
                schema_path,
            ));
            return spec;
        };

        if entries.is_empty() {
            errors.push(ValidationError::new(
                "must declare at least one task",
                spec_path,
                &format!("{}.minProperties", schema_path),
            ));
            return spec;
        }

        for (task_name, task_value) in entries {
            if !TASK_NAME_REGEX.is_match(task_name) {
                errors.push(ValidationError::new(
                    format!(
                        "task name {:?} does not match pattern {:?}",
                        task_name, TASK_NAME_PATTERN
                    ),
                    &join_path(spec_path, task_name),
                    &format!("{}.patternProperties", schema_path),
                ));
                continue;
            }

            let task_spec = TaskSpec::from_value(
                task_value,
                &join_path(spec_path, task_name),
                &format!("{}.patternProperties.^\\w+$", schema_path),
                errors,
            );
            spec.tasks.insert(task_name.clone(), task_spec);
        }

        spec
    }

    /// Breadth-first context validation over the task graph.
    ///
    /// Starting from the start tasks with the parent's context, each task
    /// is validated with the names accumulated along its path; every
    /// transition then extends the branch context with its published
    /// names. Branches reaching a join task accumulate their contexts so
    /// the join sees the union of every incoming branch; sibling branches
    /// never see each other's names before such a convergence point.
    ///
    /// Returns the accumulated errors and the rolling union of every name
    /// observed along any path.
    pub(crate) fn validate_context(
        &self,
        parent: &SpecParent,
    ) -> (Vec<ValidationError>, BTreeSet<String>) {
        let mut errors = Vec::new();
        let mut rolling_ctx: BTreeSet<String> = parent.ctx.clone();
        let mut join_ctxs: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut queue: VecDeque<(String, Option<BTreeSet<String>>)> = VecDeque::new();
        // Contexts already delivered per task; re-walking a task with a
        // context it has already seen cannot find anything new, and the
        // guard keeps the walk finite on cyclic graphs.
        let mut delivered: HashMap<String, Vec<BTreeSet<String>>> = HashMap::new();

        for (task_name, _) in self.get_start_tasks() {
            queue.push_back((task_name, Some(rolling_ctx.clone())));
        }

        while let Some((task_name, task_ctx)) = queue.pop_front() {
            let mut task_ctx = match task_ctx {
                Some(ctx) => ctx,
                None => join_ctxs.get(&task_name).cloned().unwrap_or_default(),
            };

            let seen = delivered.entry(task_name.clone()).or_default();
            if seen.contains(&task_ctx) {
                continue;
            }
            seen.push(task_ctx.clone());

            let Some(task_spec) = self.tasks.get(&task_name) else {
                // Unknown `do` targets are reported by the composer.
                continue;
            };

            debug!(task = %task_name, names = task_ctx.len(), "validating task context");

            let spec_path = join_path(&parent.spec_path, &task_name);
            let schema_path = format!("{}.patternProperties.^\\w+$", parent.schema_path);

            let task_parent = SpecParent {
                ctx: task_ctx.clone(),
                spec_path: spec_path.clone(),
                schema_path: schema_path.clone(),
            };
            let (task_errors, delta) = task_spec.validate_context(&task_parent);
            errors.extend(task_errors);
            task_ctx.extend(delta);
            rolling_ctx.extend(task_ctx.iter().cloned());

            for (i, transition) in task_spec.next.iter().enumerate() {
                let transition_parent = SpecParent {
                    ctx: task_ctx.clone(),
                    spec_path: format!("{}.next[{}]", spec_path, i),
                    schema_path: format!("{}.properties.next.items", schema_path),
                };
                let (transition_errors, published) =
                    transition.validate_context(&transition_parent);
                errors.extend(transition_errors);

                let mut branch_ctx = task_ctx.clone();
                branch_ctx.extend(published);
                rolling_ctx.extend(branch_ctx.iter().cloned());

                for next_task_name in transition.next_task_names() {
                    let Some(next_task_spec) = self.tasks.get(&next_task_name) else {
                        continue;
                    };

                    if !next_task_spec.has_join() {
                        queue.push_back((next_task_name, Some(branch_ctx.clone())));
                    } else {
                        let accumulated = join_ctxs.entry(next_task_name.clone()).or_default();
                        accumulated.extend(branch_ctx.iter().cloned());
                        queue.push_back((next_task_name, None));
                    }
                }
            }
        }

        (errors, rolling_ctx)
    }
}

/// The root workflow record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSpec {
    version: Option<Value>,
    input: Vec<InputParameterSpec>,
    vars: IndexMap<String, Value>,
    output: IndexMap<String, Value>,
    tasks: TaskMappingSpec,
}

impl WorkflowSpec {
    /// Construct a spec from an already-parsed definition.
    ///
    /// Fails with [`SpecError::Validation`] listing *every* schema
    /// violation found, each with a dotted path to the offending location.
    pub fn instantiate(definition: &Value) -> Result<Self, SpecError> {
        let mut errors = Vec::new();

        let Some(entries) = definition.as_object() else {
            errors.push(ValidationError::new(
                "expected the workflow definition to be a mapping",
                "",
                "",
            ));
            return Err(SpecError::Validation(errors));
        };

        for key in entries.keys() {
            if !matches!(key.as_str(), "version" | "input" | "vars" | "output" | "tasks") {
                errors.push(ValidationError::new(
                    format!("additional property {:?} is not allowed", key),
                    key,
                    "additionalProperties",
                ));
            }
        }

        let version = match entries.get("version") {
            Some(value @ (Value::String(_) | Value::Number(_))) => Some(value.clone()),
            Some(_) => {
                errors.push(ValidationError::new(
                    "expected a string or a number",
                    "version",
                    "properties.version",
                ));
                None
            }
            None => None,
        };

        let input = match entries.get("input") {
            Some(value) => match constraints::unique_string_or_one_key_mapping_list(value) {
                Ok(parsed) => parsed
                    .into_iter()
                    .map(|(name, default)| InputParameterSpec { name, default })
                    .collect(),
                Err(message) => {
                    errors.push(ValidationError::new(message, "input", "properties.input"));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let vars = match entries.get("vars") {
            Some(value) => match constraints::nonempty_mapping(value) {
                Ok(mapping) => mapping.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                Err(message) => {
                    errors.push(ValidationError::new(message, "vars", "properties.vars"));
                    IndexMap::new()
                }
            },
            None => IndexMap::new(),
        };

        let output = match entries.get("output") {
            Some(value) => match constraints::nonempty_mapping(value) {
                Ok(mapping) => mapping.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                Err(message) => {
                    errors.push(ValidationError::new(message, "output", "properties.output"));
                    IndexMap::new()
                }
            },
            None => IndexMap::new(),
        };

        let tasks = match entries.get("tasks") {
            Some(value) => {
                TaskMappingSpec::from_value(value, "tasks", "properties.tasks", &mut errors)
            }
            None => {
                errors.push(ValidationError::new(
                    "\"tasks\" is a required property",
                    "",
                    "required",
                ));
                TaskMappingSpec::default()
            }
        };

        if !errors.is_empty() {
            return Err(SpecError::Validation(errors));
        }

        debug!(tasks = tasks.len(), "instantiated workflow spec");

        Ok(WorkflowSpec {
            version,
            input,
            vars,
            output,
            tasks,
        })
    }

    /// Parse a serialized definition (YAML or JSON text) and instantiate
    /// it.
    pub fn deserialize(text: &str) -> Result<Self, SpecError> {
        let definition: Value = serde_yaml::from_str(text)?;
        Self::instantiate(&definition)
    }

    pub fn version(&self) -> Option<&Value> {
        self.version.as_ref()
    }

    pub fn input(&self) -> &[InputParameterSpec] {
        &self.input
    }

    pub fn vars(&self) -> &IndexMap<String, Value> {
        &self.vars
    }

    pub fn output(&self) -> &IndexMap<String, Value> {
        &self.output
    }

    pub fn tasks(&self) -> &TaskMappingSpec {
        &self.tasks
    }

    /// Inspect the spec for expression syntax errors and context errors.
    ///
    /// Schema violations are caught at construction; this pass reports
    /// everything else wrong with the workflow in one list.
    pub fn inspect(&self) -> Vec<ValidationError> {
        let mut errors = self.inspect_expression_syntax();
        errors.extend(self.validate_context());
        errors
    }

    fn inspect_expression_syntax(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for parameter in &self.input {
            if let Some(default) = &parameter.default {
                check_syntax(default, "input", "properties.input", &mut errors);
            }
        }

        for (name, value) in &self.vars {
            check_syntax(value, &format!("vars.{}", name), "properties.vars", &mut errors);
        }

        for (name, value) in &self.output {
            check_syntax(value, &format!("output.{}", name), "properties.output", &mut errors);
        }

        let tasks_schema = "properties.tasks.patternProperties.^\\w+$";
        for (task_name, task_spec) in self.tasks.iter() {
            let task_path = format!("tasks.{}", task_name);

            if let Some(action) = task_spec.action() {
                check_text_syntax(
                    action,
                    &join_path(&task_path, "action"),
                    &format!("{}.properties.action", tasks_schema),
                    &mut errors,
                );
            }

            if let Some(input) = task_spec.input() {
                for (name, value) in input {
                    check_syntax(
                        value,
                        &join_path(&task_path, &format!("input.{}", name)),
                        &format!("{}.properties.input", tasks_schema),
                        &mut errors,
                    );
                }
            }

            if let Some(with) = task_spec.with() {
                if let Some(items) = with.items() {
                    for text in items.texts() {
                        check_text_syntax(
                            text,
                            &join_path(&task_path, "with.items"),
                            &format!("{}.properties.with.properties.items", tasks_schema),
                            &mut errors,
                        );
                    }
                }
                if let Some(ConcurrencySpec::Expression(text)) = with.concurrency() {
                    check_text_syntax(
                        text,
                        &join_path(&task_path, "with.concurrency"),
                        &format!("{}.properties.with.properties.concurrency", tasks_schema),
                        &mut errors,
                    );
                }
            }

            for (i, transition) in task_spec.next().iter().enumerate() {
                let transition_path = format!("{}.next[{}]", task_path, i);
                let transition_schema = format!("{}.properties.next.items", tasks_schema);

                if let Some(when) = transition.when() {
                    check_text_syntax(
                        when,
                        &join_path(&transition_path, "when"),
                        &format!("{}.properties.when", transition_schema),
                        &mut errors,
                    );
                }

                match transition.publish() {
                    Some(PublishSpec::Expression(text)) => check_text_syntax(
                        text,
                        &join_path(&transition_path, "publish"),
                        &format!("{}.properties.publish", transition_schema),
                        &mut errors,
                    ),
                    Some(PublishSpec::Mapping(entries)) => {
                        for (name, value) in entries {
                            check_syntax(
                                value,
                                &join_path(&transition_path, &format!("publish.{}", name)),
                                &format!("{}.properties.publish", transition_schema),
                                &mut errors,
                            );
                        }
                    }
                    None => {}
                }

                if let Some(do_targets) = transition.do_targets() {
                    for text in do_targets.texts() {
                        check_text_syntax(
                            text,
                            &join_path(&transition_path, "do"),
                            &format!("{}.properties.do", transition_schema),
                            &mut errors,
                        );
                    }
                }
            }
        }

        errors
    }

    /// Workflow-level context validation. Names come into scope in the
    /// order `input`, `vars`, `tasks`, `output`; `input` parameters are
    /// introduced one at a time so a default may reference an earlier
    /// parameter.
    fn validate_context(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut ctx: BTreeSet<String> = BTreeSet::new();

        for parameter in &self.input {
            if let Some(default) = &parameter.default {
                check_references(default, &ctx, "input", "properties.input", &mut errors);
            }
            ctx.insert(parameter.name.clone());
        }

        for (name, value) in &self.vars {
            check_references(
                value,
                &ctx,
                &format!("vars.{}", name),
                "properties.vars",
                &mut errors,
            );
        }
        ctx.extend(self.vars.keys().cloned());

        let parent = SpecParent {
            ctx: ctx.clone(),
            spec_path: "tasks".to_string(),
            schema_path: "properties.tasks".to_string(),
        };
        let (task_errors, rolling_ctx) = self.tasks.validate_context(&parent);
        errors.extend(task_errors);
        ctx.extend(rolling_ctx);

        for (name, value) in &self.output {
            check_references(
                value,
                &ctx,
                &format!("output.{}", name),
                "properties.output",
                &mut errors,
            );
        }

        errors
    }
}

fn string_or_unique_string_list(value: &Value) -> Result<StringOrList, String> {
    match value {
        Value::String(_) => constraints::nonempty_string(value)
            .map(|text| StringOrList::Inline(text.to_string())),
        Value::Array(_) => constraints::unique_string_list(value).map(StringOrList::List),
        _ => Err(constraints::one_of(&[
            "a non-empty string".to_string(),
            "a unique list of strings".to_string(),
        ])),
    }
}
