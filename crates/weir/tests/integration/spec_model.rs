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

use serde_json::json;
use weir::{ConcurrencySpec, JoinSpec, PublishSpec, SpecError, StringOrList};

#[test]
fn test_deserialize_full_definition() {
    weir::init_test_logging();

    let spec = weir::deserialize(
        r#"
version: 1.0
input:
  - xs
vars:
  threshold: 5
output:
  names: "<% $.xs %>"
tasks:
  fanout:
    action: pack.module.name
    input:
      item: "<% $.xs %>"
    with:
      items: "<% $.xs %>"
      concurrency: 5
    next:
      - when: "<% $.threshold > 1 %>"
        publish: "<% $.xs %>"
        do:
          - collect
  collect:
    join: all
"#,
    )
    .unwrap();

    assert_eq!(spec.version(), Some(&json!(1.0)));
    assert_eq!(spec.input().len(), 1);
    assert_eq!(spec.input()[0].name(), "xs");
    assert_eq!(spec.vars().get("threshold"), Some(&json!(5)));

    let fanout = spec.tasks().get_task("fanout").unwrap();
    assert_eq!(fanout.action(), Some("pack.module.name"));
    assert!(!fanout.has_join());

    let with = fanout.with().unwrap();
    assert_eq!(
        with.items(),
        Some(&StringOrList::Inline("<% $.xs %>".to_string()))
    );
    assert_eq!(with.concurrency(), Some(&ConcurrencySpec::Count(5)));

    let transition = &fanout.next()[0];
    assert_eq!(transition.when(), Some("<% $.threshold > 1 %>"));
    assert!(matches!(
        transition.publish(),
        Some(PublishSpec::Expression(_))
    ));
    assert_eq!(transition.next_task_names(), vec!["collect".to_string()]);

    let collect = spec.tasks().get_task("collect").unwrap();
    assert_eq!(collect.join(), Some(JoinSpec::All));
    assert!(collect.has_join());

    assert!(spec.inspect().is_empty());
}

#[test]
fn test_parse_failure_is_reported() {
    weir::init_test_logging();

    let result = weir::deserialize("tasks: [not: valid: yaml");
    assert!(matches!(result, Err(SpecError::Parse(_))));
}

#[test]
fn test_schema_violations_are_all_reported() {
    weir::init_test_logging();

    let definition = json!({
        "version": [1],
        "vars": {},
        "tasks": {
            "t1": {
                "action": 42,
                "next": [
                    {"do": ["t2", "t2"]},
                    {"publish": {}}
                ]
            },
            "t2": {}
        }
    });

    let Err(SpecError::Validation(errors)) = weir::instantiate(&definition) else {
        panic!("expected a validation failure");
    };

    let spec_paths: Vec<&str> = errors.iter().map(|e| e.spec_path.as_str()).collect();
    assert!(spec_paths.contains(&"version"));
    assert!(spec_paths.contains(&"vars"));
    assert!(spec_paths.contains(&"tasks.t1.action"));
    assert!(spec_paths.contains(&"tasks.t1.next[0].do"));
    assert!(spec_paths.contains(&"tasks.t1.next[1].publish"));
    assert_eq!(errors.len(), 5);
}

#[test]
fn test_error_paths_mirror_schema_traversal() {
    weir::init_test_logging();

    let definition = json!({
        "tasks": {
            "t1": {"join": "some"}
        }
    });

    let Err(SpecError::Validation(errors)) = weir::instantiate(&definition) else {
        panic!("expected a validation failure");
    };

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].spec_path, "tasks.t1.join");
    assert_eq!(
        errors[0].schema_path,
        "properties.tasks.patternProperties.^\\w+$.properties.join"
    );
}

#[test]
fn test_input_accepts_names_and_defaults() {
    weir::init_test_logging();

    let spec = weir::instantiate(&json!({
        "input": ["a", {"b": 2}],
        "tasks": {"t1": {}}
    }))
    .unwrap();

    assert_eq!(spec.input()[0].name(), "a");
    assert_eq!(spec.input()[0].default(), None);
    assert_eq!(spec.input()[1].name(), "b");
    assert_eq!(spec.input()[1].default(), Some(&json!(2)));
}

#[test]
fn test_input_rejects_duplicate_names() {
    weir::init_test_logging();

    let result = weir::instantiate(&json!({
        "input": ["a", {"a": 1}],
        "tasks": {"t1": {}}
    }));

    let Err(SpecError::Validation(errors)) = result else {
        panic!("expected a validation failure");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].spec_path, "input");
}

#[test]
fn test_spec_is_immutable_and_shareable() {
    weir::init_test_logging();

    let spec = weir::instantiate(&json!({
        "tasks": {
            "t1": {"next": [{"do": "t2"}]},
            "t2": {}
        }
    }))
    .unwrap();

    // Specs are plain data; concurrent readers need no locking.
    let spec = std::sync::Arc::new(spec);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let spec = std::sync::Arc::clone(&spec);
            std::thread::spawn(move || {
                assert_eq!(spec.tasks().get_next_tasks("t1").len(), 1);
                assert!(weir::graph::compose(&spec).is_ok());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
