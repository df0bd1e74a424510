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

//! # Graph Composer
//!
//! Compiles a validated [`WorkflowSpec`] into two directed multigraphs:
//! the *workflow graph* (the static shape of the workflow) and the
//! *workflow execution graph* (the same shape annotated for the runtime
//! executor, whose nodes additionally carry a `name`).
//!
//! Both artifacts serialize to a node-link shape: `nodes` in task
//! declaration order, `adjacency` indexed by node order with each inner
//! list holding the outgoing edges sorted lexicographically by target.
//! Edges carry `criteria` (the transition's `when` expression, wrapped in
//! sigils as needed) and `key`, the multigraph disambiguator for parallel
//! edges between the same endpoints.
//!
//! Composed graphs are immutable artifacts; composition is deterministic
//! for a given spec.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ComposeError;
use crate::expr;
use crate::spec::workflow::{JoinSpec, WorkflowSpec};

/// Join semantics attached to a graph node: wait for every incoming
/// branch (`"*"`) or for a fixed number of branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    All,
    Count(u64),
}

impl Serialize for Barrier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Barrier::All => serializer.serialize_str("*"),
            Barrier::Count(count) => serializer.serialize_u64(*count),
        }
    }
}

impl<'de> Deserialize<'de> for Barrier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) if text == "*" => Ok(Barrier::All),
            Value::Number(number) => match number.as_u64() {
                Some(count) if count >= 1 => Ok(Barrier::Count(count)),
                _ => Err(D::Error::custom("barrier count must be a positive integer")),
            },
            other => Err(D::Error::custom(format!(
                "expected \"*\" or a positive integer, got {}",
                other
            ))),
        }
    }
}

/// A node of a composed graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    /// Present only in the execution graph. Kept distinct from `id` to
    /// accommodate tasks whose executed name diverges from their node id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barrier: Option<Barrier>,
}

/// An outgoing edge of a composed graph, keyed for parallel edges
/// between the same endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub key: usize,
    pub criteria: Vec<String>,
}

/// A composed directed multigraph in node-link form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub directed: bool,
    pub multigraph: bool,
    pub graph: Map<String, Value>,
    pub nodes: Vec<GraphNode>,
    pub adjacency: Vec<Vec<GraphEdge>>,
}

/// Compose a validated spec into its workflow graph and execution graph.
///
/// Fails if any transition's `do` names a task not present in `tasks`.
/// Cycles are permitted; back-edges compose like any other edge.
pub fn compose(spec: &WorkflowSpec) -> Result<(WorkflowGraph, WorkflowGraph), ComposeError> {
    let workflow_graph = compose_graph(spec, false)?;
    let execution_graph = compose_graph(spec, true)?;
    Ok((workflow_graph, execution_graph))
}

fn compose_graph(spec: &WorkflowSpec, execution: bool) -> Result<WorkflowGraph, ComposeError> {
    let tasks = spec.tasks();
    let mut graph = DiGraph::<GraphNode, GraphEdge>::new();
    let mut node_indices: HashMap<String, NodeIndex> = HashMap::new();

    for (task_name, task_spec) in tasks.iter() {
        let node = GraphNode {
            id: task_name.to_string(),
            name: execution.then(|| task_name.to_string()),
            barrier: task_spec.join().map(|join| match join {
                JoinSpec::All => Barrier::All,
                JoinSpec::Count(count) => Barrier::Count(count),
            }),
        };
        let index = graph.add_node(node);
        node_indices.insert(task_name.to_string(), index);
    }

    for (task_name, _) in tasks.iter() {
        let source = node_indices[task_name];
        for (next_task_name, condition) in tasks.get_next_tasks(task_name) {
            let target = node_indices.get(&next_task_name).copied().ok_or_else(|| {
                ComposeError::UnknownTask {
                    task: task_name.to_string(),
                    target: next_task_name.clone(),
                }
            })?;

            let key = graph.edges_connecting(source, target).count();
            let criteria = match &condition {
                Some(when) => vec![expr::wrap(when)],
                None => Vec::new(),
            };

            graph.add_edge(
                source,
                target,
                GraphEdge {
                    id: next_task_name.clone(),
                    key,
                    criteria,
                },
            );
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        execution,
        "composed workflow graph"
    );

    let mut nodes = Vec::with_capacity(graph.node_count());
    let mut adjacency = Vec::with_capacity(graph.node_count());

    for index in graph.node_indices() {
        nodes.push(graph[index].clone());

        // Outgoing edges iterate most-recent-first; restore insertion
        // order so adjacency matches get_next_tasks ordering.
        let mut edges: Vec<GraphEdge> = graph.edges(index).map(|e| e.weight().clone()).collect();
        edges.reverse();
        adjacency.push(edges);
    }

    Ok(WorkflowGraph {
        directed: true,
        multigraph: true,
        graph: Map::new(),
        nodes,
        adjacency,
    })
}
