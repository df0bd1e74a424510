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

use weir::WorkflowSpec;

fn deserialize(text: &str) -> WorkflowSpec {
    weir::deserialize(text).unwrap()
}

#[test]
fn test_workflow_level_context_ordering() {
    weir::init_test_logging();

    // input comes into scope before vars, vars before tasks, and the
    // names observed along task paths before output.
    let spec = deserialize(
        r#"
input:
  - count
  - batch: "<% int($.count) %>"
vars:
  label: "batch <% $.batch %>"
output:
  result: "<% $.summary %>"
tasks:
  t1:
    action: core.noop
    input:
      size: "<% $.batch %>"
    next:
      - publish:
          summary: "<% $.label %>"
        do: t2
  t2:
    action: core.noop
"#,
    );

    assert!(spec.inspect().is_empty());
}

#[test]
fn test_undefined_publish_reference_reports_transition_path() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - publish:
          x: "<% $.y %>"
        do: t2
  t2:
    action: core.noop
"#,
    );

    let errors = spec.inspect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].spec_path.contains(".next[0]"));
    assert!(errors[0].message.contains("\"y\""));
    assert!(errors[0].schema_path.contains("properties.next.items"));
}

#[test]
fn test_published_names_flow_downstream() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - publish:
          x: 1
        do: t2
  t2:
    input:
      value: "<% $.x %>"
    next:
      - do: t3
  t3:
    input:
      value: "<% $.x %>"
"#,
    );

    assert!(spec.inspect().is_empty());
}

#[test]
fn test_sibling_branches_do_not_share_context() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - publish:
          x: 1
        do: t2
      - do: t3
  t2:
    action: core.noop
  t3:
    input:
      value: "<% $.x %>"
"#,
    );

    let errors = spec.inspect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].spec_path, "tasks.t3.input.value");
}

#[test]
fn test_join_context_is_union_of_branches() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - publish:
          a: 1
        do: t2
      - publish:
          b: 2
        do: t3
  t2:
    next:
      - do: t4
  t3:
    next:
      - do: t4
  t4:
    join: all
    input:
      combined: "<% $.a %> + <% $.b %>"
"#,
    );

    assert!(spec.inspect().is_empty());
}

#[test]
fn test_start_task_coverage() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  c:
    action: core.noop
  a:
    next:
      - do: b
  b:
    action: core.noop
"#,
    );

    // Every task without predecessors is a start task and vice versa,
    // sorted lexicographically.
    assert_eq!(
        spec.tasks().get_start_tasks(),
        vec![("a".to_string(), None), ("c".to_string(), None)]
    );

    for (name, _) in spec.tasks().get_start_tasks() {
        assert!(spec.tasks().get_prev_tasks(&name).is_empty());
    }
}

#[test]
fn test_next_tasks_are_lexicographically_ordered() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - do: zebra, alpha, mango
  alpha:
    action: core.noop
  mango:
    action: core.noop
  zebra:
    action: core.noop
"#,
    );

    let next_tasks: Vec<String> = spec
        .tasks()
        .get_next_tasks("t1")
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(next_tasks, vec!["alpha", "mango", "zebra"]);
}

#[test]
fn test_join_split_exclusivity() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - do: t2, t3
  t2:
    next:
      - do: t4, t5
  t3:
    next:
      - do: t4, t5
  t4:
    join: all
  t5:
    action: core.noop
"#,
    );

    let tasks = spec.tasks();
    assert!(tasks.is_join_task("t4"));
    assert!(!tasks.is_split_task("t4"));
    assert!(tasks.is_split_task("t5"));
    assert!(!tasks.is_join_task("t5"));

    for name in tasks.task_names() {
        assert!(!(tasks.is_join_task(name) && tasks.is_split_task(name)));
    }
}

#[test]
fn test_self_loop_is_a_cycle() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - do: t1
"#,
    );

    assert!(spec.tasks().in_cycle("t1"));
    assert!(spec.tasks().has_cycles());
}

#[test]
fn test_transition_without_do_is_still_validated() {
    weir::init_test_logging();

    let spec = deserialize(
        r#"
tasks:
  t1:
    next:
      - publish:
          x: "<% $.missing %>"
"#,
    );

    let errors = spec.inspect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].spec_path, "tasks.t1.next[0].publish.x");
}
