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

use pretty_assertions::assert_eq;
use serde_json::json;
use weir::graph::{compose, WorkflowGraph};

#[test]
fn test_compose_sequential_workflow() {
    weir::init_test_logging();

    let spec = weir::deserialize(
        r#"
version: 1.0
tasks:
  t1:
    action: core.noop
    next:
      - do: t2
  t2:
    action: core.noop
    next:
      - do: t3
  t3:
    action: core.noop
"#,
    )
    .unwrap();

    assert_eq!(spec.tasks().get_start_tasks(), vec![("t1".to_string(), None)]);
    assert_eq!(
        spec.tasks().get_next_tasks("t1"),
        vec![("t2".to_string(), None)]
    );
    assert!(!spec.tasks().has_cycles());

    let (workflow_graph, _) = compose(&spec).unwrap();

    let expected = json!({
        "directed": true,
        "multigraph": true,
        "graph": {},
        "nodes": [
            {"id": "t1"},
            {"id": "t2"},
            {"id": "t3"}
        ],
        "adjacency": [
            [{"id": "t2", "key": 0, "criteria": []}],
            [{"id": "t3", "key": 0, "criteria": []}],
            []
        ]
    });

    assert_eq!(serde_json::to_value(&workflow_graph).unwrap(), expected);
}

#[test]
fn test_compose_join_workflow() {
    weir::init_test_logging();

    let spec = weir::deserialize(
        r#"
version: 1.0
tasks:
  task1:
    action: core.noop
    next:
      - when: '<% task_state(task1) = "SUCCESS" %>'
        do: task2, task4
  task2:
    action: core.noop
    next:
      - when: '<% task_state(task2) = "SUCCESS" %>'
        do: task3
  task3:
    action: core.noop
    next:
      - when: '<% task_state(task3) = "SUCCESS" %>'
        do: task6
  task4:
    action: core.noop
    next:
      - when: '<% task_state(task4) = "SUCCESS" %>'
        do: task5
  task5:
    action: core.noop
    next:
      - when: '<% task_state(task5) = "SUCCESS" %>'
        do: task6
  task6:
    join: all
    action: core.noop
    next:
      - when: '<% task_state(task6) = "SUCCESS" %>'
        do: task7
  task7:
    action: core.noop
"#,
    )
    .unwrap();

    assert!(spec.tasks().is_join_task("task6"));
    assert!(!spec.tasks().is_split_task("task6"));

    let (workflow_graph, execution_graph) = compose(&spec).unwrap();

    let expected_wf_graph = json!({
        "directed": true,
        "graph": {},
        "nodes": [
            {"id": "task1"},
            {"id": "task2"},
            {"id": "task3"},
            {"id": "task4"},
            {"id": "task5"},
            {"id": "task6", "barrier": "*"},
            {"id": "task7"}
        ],
        "adjacency": [
            [
                {"id": "task2", "key": 0, "criteria": ["<% task_state(task1) = \"SUCCESS\" %>"]},
                {"id": "task4", "key": 0, "criteria": ["<% task_state(task1) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task3", "key": 0, "criteria": ["<% task_state(task2) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task6", "key": 0, "criteria": ["<% task_state(task3) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task5", "key": 0, "criteria": ["<% task_state(task4) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task6", "key": 0, "criteria": ["<% task_state(task5) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task7", "key": 0, "criteria": ["<% task_state(task6) = \"SUCCESS\" %>"]}
            ],
            []
        ],
        "multigraph": true
    });

    assert_eq!(serde_json::to_value(&workflow_graph).unwrap(), expected_wf_graph);

    let expected_wf_ex_graph = json!({
        "directed": true,
        "graph": {},
        "nodes": [
            {"id": "task1", "name": "task1"},
            {"id": "task2", "name": "task2"},
            {"id": "task3", "name": "task3"},
            {"id": "task4", "name": "task4"},
            {"id": "task5", "name": "task5"},
            {"id": "task6", "name": "task6", "barrier": "*"},
            {"id": "task7", "name": "task7"}
        ],
        "adjacency": [
            [
                {"id": "task2", "key": 0, "criteria": ["<% task_state(task1) = \"SUCCESS\" %>"]},
                {"id": "task4", "key": 0, "criteria": ["<% task_state(task1) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task3", "key": 0, "criteria": ["<% task_state(task2) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task6", "key": 0, "criteria": ["<% task_state(task3) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task5", "key": 0, "criteria": ["<% task_state(task4) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task6", "key": 0, "criteria": ["<% task_state(task5) = \"SUCCESS\" %>"]}
            ],
            [
                {"id": "task7", "key": 0, "criteria": ["<% task_state(task6) = \"SUCCESS\" %>"]}
            ],
            []
        ],
        "multigraph": true
    });

    assert_eq!(
        serde_json::to_value(&execution_graph).unwrap(),
        expected_wf_ex_graph
    );
}

#[test]
fn test_compose_join_count_workflow() {
    weir::init_test_logging();

    let spec = weir::deserialize(
        r#"
version: 1.0
tasks:
  task1:
    action: core.noop
    next:
      - when: '<% task_state(task1) = "SUCCESS" %>'
        do: task2, task4, task6
  task2:
    action: core.noop
    next:
      - when: '<% task_state(task2) = "SUCCESS" %>'
        do: task3
  task3:
    action: core.noop
    next:
      - when: '<% task_state(task3) = "SUCCESS" %>'
        do: task8
  task4:
    action: core.noop
    next:
      - when: '<% task_state(task4) = "SUCCESS" %>'
        do: task5
  task5:
    action: core.noop
    next:
      - when: '<% task_state(task5) = "SUCCESS" %>'
        do: task8
  task6:
    action: core.noop
    next:
      - when: '<% task_state(task6) = "SUCCESS" %>'
        do: task7
  task7:
    action: core.noop
    next:
      - when: '<% task_state(task7) = "SUCCESS" %>'
        do: task8
  task8:
    join: 2
    action: core.noop
"#,
    )
    .unwrap();

    let (workflow_graph, execution_graph) = compose(&spec).unwrap();

    let barrier_node = serde_json::to_value(&workflow_graph.nodes[7]).unwrap();
    assert_eq!(barrier_node, json!({"id": "task8", "barrier": 2}));

    let expected_adjacency = json!([
        [
            {"id": "task2", "key": 0, "criteria": ["<% task_state(task1) = \"SUCCESS\" %>"]},
            {"id": "task4", "key": 0, "criteria": ["<% task_state(task1) = \"SUCCESS\" %>"]},
            {"id": "task6", "key": 0, "criteria": ["<% task_state(task1) = \"SUCCESS\" %>"]}
        ],
        [
            {"id": "task3", "key": 0, "criteria": ["<% task_state(task2) = \"SUCCESS\" %>"]}
        ],
        [
            {"id": "task8", "key": 0, "criteria": ["<% task_state(task3) = \"SUCCESS\" %>"]}
        ],
        [
            {"id": "task5", "key": 0, "criteria": ["<% task_state(task4) = \"SUCCESS\" %>"]}
        ],
        [
            {"id": "task8", "key": 0, "criteria": ["<% task_state(task5) = \"SUCCESS\" %>"]}
        ],
        [
            {"id": "task7", "key": 0, "criteria": ["<% task_state(task6) = \"SUCCESS\" %>"]}
        ],
        [
            {"id": "task8", "key": 0, "criteria": ["<% task_state(task7) = \"SUCCESS\" %>"]}
        ],
        []
    ]);

    assert_eq!(
        serde_json::to_value(&workflow_graph.adjacency).unwrap(),
        expected_adjacency
    );

    // The execution graph has the same shape plus node names.
    assert_eq!(workflow_graph.adjacency, execution_graph.adjacency);
    assert_eq!(
        serde_json::to_value(&execution_graph.nodes[7]).unwrap(),
        json!({"id": "task8", "name": "task8", "barrier": 2})
    );
}

#[test]
fn test_compose_cyclic_workflow() {
    weir::init_test_logging();

    let spec = weir::deserialize(
        r#"
tasks:
  t1:
    next:
      - do: t2
  t2:
    next:
      - do: t1
"#,
    )
    .unwrap();

    assert!(spec.tasks().in_cycle("t1"));
    assert!(spec.tasks().in_cycle("t2"));
    assert!(spec.tasks().has_cycles());

    // Back-edges compose like any other edge.
    let (workflow_graph, _) = compose(&spec).unwrap();
    assert_eq!(workflow_graph.nodes.len(), 2);
    assert_eq!(workflow_graph.adjacency[0].len(), 1);
    assert_eq!(workflow_graph.adjacency[1].len(), 1);
    assert_eq!(workflow_graph.adjacency[1][0].id, "t1");
}

#[test]
fn test_composed_graph_round_trips_through_json() {
    weir::init_test_logging();

    let spec = weir::deserialize(
        r#"
tasks:
  t1:
    next:
      - when: '<% $.ready %>'
        do: t2
  t2:
    join: all
"#,
    )
    .unwrap();

    let (workflow_graph, _) = compose(&spec).unwrap();
    let serialized = serde_json::to_string(&workflow_graph).unwrap();
    let deserialized: WorkflowGraph = serde_json::from_str(&serialized).unwrap();
    assert_eq!(workflow_graph, deserialized);
}
