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

//! # Weir
//!
//! Weir is the static composition and validation core of a workflow
//! orchestrator. It ingests a declarative workflow definition describing
//! tasks and their conditional transitions, validates its structure and
//! variable-reference context, detects cycles and join points, and
//! composes it into executable directed multigraphs for a runtime engine.
//!
//! ## Core Components
//!
//! - [`spec`]: the typed workflow model, schema validation with full
//!   error accumulation, graph traversal primitives, and the
//!   breadth-first context validator
//! - [`expr`]: the expression facade over sigil-delimited fragments,
//!   evaluated against a data context with strict type preservation
//! - [`graph`]: the composer producing the workflow graph and the
//!   workflow execution graph
//!
//! ## Key Properties
//!
//! - Validation accumulates errors; a single inspection pass reports
//!   everything wrong with a workflow
//! - Composition is deterministic: nodes follow declaration order and
//!   adjacency lists are sorted lexicographically by target
//! - Specs and composed graphs are immutable after construction and can
//!   be shared across threads without locking
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let definition = json!({
//!     "version": 1.0,
//!     "tasks": {
//!         "t1": {"action": "core.noop", "next": [{"do": "t2"}]},
//!         "t2": {"action": "core.noop"}
//!     }
//! });
//!
//! let spec = weir::instantiate(&definition)?;
//! assert!(spec.inspect().is_empty());
//!
//! let (workflow_graph, execution_graph) = weir::graph::compose(&spec)?;
//! assert_eq!(workflow_graph.nodes.len(), 2);
//! assert_eq!(execution_graph.nodes[0].name.as_deref(), Some("t1"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod expr;
pub mod graph;
pub mod spec;

use serde_json::Value;

pub use error::{ComposeError, ExpressionError, FunctionError, SpecError, ValidationError};
pub use graph::{compose, Barrier, GraphEdge, GraphNode, WorkflowGraph};
pub use spec::workflow::{
    ConcurrencySpec, InputParameterSpec, ItemizedSpec, JoinSpec, PublishSpec, StringOrList,
    TaskMappingSpec, TaskSpec, TaskTransitionSpec, WorkflowSpec,
};

/// Construct a [`WorkflowSpec`] from an already-parsed definition.
pub fn instantiate(definition: &Value) -> Result<WorkflowSpec, SpecError> {
    WorkflowSpec::instantiate(definition)
}

/// Parse a serialized definition (YAML or JSON text) and instantiate it.
pub fn deserialize(text: &str) -> Result<WorkflowSpec, SpecError> {
    WorkflowSpec::deserialize(text)
}

/// Initialize tracing output for tests. Safe to call repeatedly; only the
/// first call installs a subscriber.
#[doc(hidden)]
pub fn init_test_logging() {
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
