use super::*;
use crate::error::ResourceGroupError;

const NESTED_JSON: &str = r#"{
  "rootGroups": [
    {
      "name": "global",
      "hardConcurrencyLimit": 100,
      "maxQueued": 1000,
      "subGroups": [
        { "name": "adhoc", "hardConcurrencyLimit": 3, "maxQueued": 10 },
        { "name": "etl", "maxRunning": 5, "maxQueued": 50, "schedulingPolicy": "fifo" }
      ]
    }
  ],
  "selectors": [
    { "user": "etl_.*", "group": "global.etl" },
    { "group": "global.adhoc" }
  ]
}"#;

fn validation_message(err: ResourceGroupError) -> String {
    match err {
        ResourceGroupError::Validation(msg) => msg,
        other => panic!("expected Validation error, got {other:?}"),
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

#[test]
fn parse_nested_json() {
    let def = ResourceGroupsDefinition::from_json(NESTED_JSON).unwrap();
    assert_eq!(def.root_groups.len(), 1);
    let global = &def.root_groups[0];
    assert_eq!(global.hard_concurrency_limit, Some(100));
    assert_eq!(global.sub_groups.len(), 2);
    assert_eq!(global.sub_groups[1].hard_concurrency_limit, Some(5));
    assert_eq!(global.sub_groups[1].scheduling_policy, SchedulingPolicy::Fifo);
    assert_eq!(def.selectors[0].user.as_deref(), Some("etl_.*"));
    assert!(def.selectors[1].user.is_none());
}

#[test]
fn parse_yaml() {
    let yaml = r#"
rootGroups:
  - name: global
    hardConcurrencyLimit: 3
    maxQueued: 10
selectors:
  - source: cli
    clientTags: [batch]
    group: global
"#;
    let def = ResourceGroupsDefinition::from_yaml(yaml).unwrap();
    assert_eq!(def.root_groups[0].hard_concurrency_limit, Some(3));
    assert_eq!(def.selectors[0].client_tags, vec!["batch".to_string()]);
}

#[test]
fn malformed_json_is_parse_error() {
    let err = ResourceGroupsDefinition::from_json("{ rootGroups: ").unwrap_err();
    assert!(matches!(err, ResourceGroupError::Json(_)));
}

#[test]
fn unknown_scheduling_policy_rejected() {
    let json = r#"{ "rootGroups": [
        { "name": "g", "hardConcurrencyLimit": 1, "maxQueued": 1, "schedulingPolicy": "weighted" }
    ] }"#;
    assert!(ResourceGroupsDefinition::from_json(json).is_err());
}

#[test]
fn group_path_round_trip() {
    let path: GroupPath = "global.adhoc".parse().unwrap();
    assert_eq!(path.depth(), 2);
    assert_eq!(path.name(), "adhoc");
    assert_eq!(path, GroupPath::root("global").child("adhoc"));
    assert_eq!(path.to_string(), "global.adhoc");
    assert!("global..adhoc".parse::<GroupPath>().is_err());
    assert!("".parse::<GroupPath>().is_err());
}

// ── Validation ──────────────────────────────────────────────────────

#[test]
fn missing_root_groups_rejected() {
    let def = ResourceGroupsDefinition {
        root_groups: vec![],
        selectors: vec![],
    };
    let msg = validation_message(def.validate().unwrap_err());
    assert!(msg.contains("root group"));
}

#[test]
fn missing_hard_limit_rejected() {
    let json = r#"{ "rootGroups": [ { "name": "global", "maxQueued": 10 } ] }"#;
    let msg = validation_message(ResourceGroupsDefinition::from_json(json).unwrap_err());
    assert!(msg.contains("hardConcurrencyLimit"));
}

#[test]
fn missing_max_queued_rejected() {
    let json = r#"{ "rootGroups": [ { "name": "global", "hardConcurrencyLimit": 1 } ] }"#;
    let msg = validation_message(ResourceGroupsDefinition::from_json(json).unwrap_err());
    assert!(msg.contains("maxQueued"));
}

#[test]
fn soft_memory_limit_rejected() {
    let yaml = r#"
rootGroups:
  - name: global
    hardConcurrencyLimit: 3
    maxQueued: 10
    softMemoryLimit: 1GB
"#;
    let msg = validation_message(ResourceGroupsDefinition::from_yaml(yaml).unwrap_err());
    assert!(msg.contains("softMemoryLimit"));
    assert!(msg.contains("global"));
}

#[test]
fn dotted_group_name_rejected() {
    let def = ResourceGroupsDefinition {
        root_groups: vec![GroupSpec::leaf("a.b", 1, 1)],
        selectors: vec![],
    };
    let msg = validation_message(def.validate().unwrap_err());
    assert!(msg.contains("a.b"));
}

#[test]
fn duplicate_siblings_rejected() {
    let def = ResourceGroupsDefinition {
        root_groups: vec![GroupSpec::leaf("global", 10, 10)
            .with_sub_group(GroupSpec::leaf("adhoc", 1, 1))
            .with_sub_group(GroupSpec::leaf("adhoc", 2, 2))],
        selectors: vec![],
    };
    let msg = validation_message(def.validate().unwrap_err());
    assert!(msg.contains("duplicate sub-group"));
}

#[test]
fn selector_to_unknown_group_rejected() {
    let def = ResourceGroupsDefinition {
        root_groups: vec![GroupSpec::leaf("global", 1, 1)],
        selectors: vec![SelectorSpec::to_group("global.missing")],
    };
    let msg = validation_message(def.validate().unwrap_err());
    assert!(msg.contains("unknown group"));
}

#[test]
fn selector_to_inner_group_rejected() {
    let def = ResourceGroupsDefinition {
        root_groups: vec![GroupSpec::leaf("global", 10, 10).with_sub_group(GroupSpec::leaf("adhoc", 1, 1))],
        selectors: vec![SelectorSpec::to_group("global")],
    };
    let msg = validation_message(def.validate().unwrap_err());
    assert!(msg.contains("not a leaf"));
}

#[test]
fn invalid_selector_pattern_rejected() {
    let def = ResourceGroupsDefinition {
        root_groups: vec![GroupSpec::leaf("global", 1, 1)],
        selectors: vec![SelectorSpec {
            user: Some("(unclosed".to_string()),
            ..SelectorSpec::to_group("global")
        }],
    };
    let msg = validation_message(def.validate().unwrap_err());
    assert!(msg.contains("user pattern"));
}

// ── File loading ────────────────────────────────────────────────────

#[test]
fn load_json_and_yaml_files() {
    let dir = tempfile::tempdir().unwrap();

    let json_path = dir.path().join("groups.json");
    std::fs::write(&json_path, NESTED_JSON).unwrap();
    let def = ResourceGroupsDefinition::from_file(&json_path).unwrap();
    assert_eq!(def.selectors.len(), 2);

    let yaml_path = dir.path().join("groups.yaml");
    std::fs::write(
        &yaml_path,
        "rootGroups:\n  - name: global\n    hardConcurrencyLimit: 1\n    maxQueued: 1\n",
    )
    .unwrap();
    let def = ResourceGroupsDefinition::from_file(&yaml_path).unwrap();
    assert_eq!(def.root_groups[0].name, "global");
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ResourceGroupsDefinition::from_file(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, ResourceGroupError::Io { .. }));
}
