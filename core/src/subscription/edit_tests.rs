//! Tests for group editing
//!
//! Verifies key assignment, rejection rules and that rejected edits leave
//! the input document unchanged.

use taprule_types::{AppRaw, GroupRaw, RuleRaw, SubscriptionRaw};

use super::{DocumentError, EditError, add_from_source, add_groups, delete_group, edit_group};

fn make_group(key: i32, name: &str) -> GroupRaw {
    GroupRaw {
        key,
        name: name.to_string(),
        desc: None,
        enable: None,
        rules: vec![RuleRaw::new(0, [r#"[text="Skip"]"#])],
    }
}

fn make_doc() -> SubscriptionRaw {
    SubscriptionRaw {
        id: -2,
        version: 0,
        name: Some("local".into()),
        update_url: None,
        apps: vec![
            AppRaw {
                id: "com.x".into(),
                name: None,
                groups: vec![make_group(1, "splash"), make_group(5, "popup")],
            },
            AppRaw {
                id: "com.empty".into(),
                name: None,
                groups: Vec::new(),
            },
        ],
    }
}

fn keys(doc: &SubscriptionRaw, app_id: &str) -> Vec<i32> {
    doc.app(app_id).unwrap().groups.iter().map(|g| g.key).collect()
}

#[test]
fn test_add_assigns_keys_after_max() {
    let doc = make_doc();
    let added = add_groups(
        &doc,
        "com.x",
        vec![make_group(0, "a"), make_group(0, "b"), make_group(99, "c")],
    )
    .unwrap();
    assert_eq!(keys(&added, "com.x"), vec![1, 5, 6, 7, 8]);
    assert_eq!(added.app("com.x").unwrap().groups[4].name, "c");
}

#[test]
fn test_add_to_app_without_groups_starts_at_zero() {
    let doc = make_doc();
    let added = add_groups(&doc, "com.empty", vec![make_group(7, "a"), make_group(7, "b")]).unwrap();
    assert_eq!(keys(&added, "com.empty"), vec![0, 1]);
}

#[test]
fn test_add_rejects_name_collisions() {
    let doc = make_doc();
    assert!(matches!(
        add_groups(&doc, "com.x", vec![make_group(0, "splash")]),
        Err(EditError::NameCollision { name }) if name == "splash"
    ));
    assert!(matches!(
        add_groups(&doc, "com.x", vec![make_group(0, "n"), make_group(0, "n")]),
        Err(EditError::NameCollision { .. })
    ));
}

#[test]
fn test_add_rejects_invalid_group_and_empty_batch() {
    let doc = make_doc();
    let mut broken = make_group(0, "broken");
    broken.rules[0].matches = vec!["[text>1]".into()];
    assert!(matches!(
        add_groups(&doc, "com.x", vec![make_group(0, "fine"), broken]),
        Err(EditError::InvalidGroup { name, .. }) if name == "broken"
    ));
    assert!(matches!(
        add_groups(&doc, "com.x", Vec::new()),
        Err(EditError::EmptyBatch)
    ));
    assert!(matches!(
        add_groups(&doc, "com.nope", vec![make_group(0, "a")]),
        Err(EditError::UnknownApp { .. })
    ));
}

#[test]
fn test_add_from_group_source() {
    let doc = make_doc();
    let text = r#"{"key":0,"name":"new","rules":[{"key":0,"matches":["Button"]}]}"#;
    let added = add_from_source(&doc, "com.x", text).unwrap();
    assert_eq!(keys(&added, "com.x"), vec![1, 5, 6]);
}

#[test]
fn test_add_from_app_source() {
    let doc = make_doc();
    let text = r#"{"id":"com.x","groups":[
        {"key":0,"name":"one","rules":[{"key":0,"matches":["A"]}]},
        {"key":1,"name":"two","rules":[{"key":0,"matches":["B"]}]}
    ]}"#;
    let added = add_from_source(&doc, "com.x", text).unwrap();
    assert_eq!(keys(&added, "com.x"), vec![1, 5, 6, 7]);

    assert!(matches!(
        add_from_source(&doc, "com.empty", text),
        Err(EditError::AppMismatch { .. })
    ));
    assert!(matches!(
        add_from_source(&doc, "com.x", r#"{"id":"com.x","groups":[]}"#),
        Err(EditError::EmptyBatch)
    ));
    assert!(matches!(
        add_from_source(&doc, "com.x", "not json"),
        Err(EditError::Payload { .. })
    ));
}

#[test]
fn test_add_from_app_source_reports_app_errors() {
    let doc = make_doc();
    let text = r#"{"id":"com.x","groups":[
        {"key":3,"name":"one","rules":[{"key":0,"matches":["A"]}]},
        {"key":3,"name":"two","rules":[{"key":0,"matches":["B"]}]}
    ]}"#;
    let err = add_from_source(&doc, "com.x", text).unwrap_err();
    assert!(matches!(
        err,
        EditError::InvalidApp {
            ref app_id,
            source: DocumentError::DuplicateGroup { key: 3, .. },
        } if app_id == "com.x"
    ));
}

#[test]
fn test_add_fails_when_group_keys_run_out() {
    let mut doc = make_doc();
    doc.apps[0].groups.push(make_group(i32::MAX, "last"));
    let before = doc.clone();

    assert!(matches!(
        add_groups(&doc, "com.x", vec![make_group(0, "a")]),
        Err(EditError::KeysExhausted { app_id }) if app_id == "com.x"
    ));
    assert_eq!(doc, before);

    doc.apps[0].groups.pop();
    doc.apps[0].groups.push(make_group(i32::MAX - 1, "almost"));
    let added = add_groups(&doc, "com.x", vec![make_group(0, "a")]).unwrap();
    assert_eq!(keys(&added, "com.x"), vec![1, 5, i32::MAX - 1, i32::MAX]);
    assert!(matches!(
        add_groups(&doc, "com.x", vec![make_group(0, "a"), make_group(0, "b")]),
        Err(EditError::KeysExhausted { .. })
    ));
}

#[test]
fn test_edit_replaces_group_in_place() {
    let doc = make_doc();
    let mut renamed = make_group(5, "popup v2");
    renamed.enable = Some(false);
    let edited = edit_group(&doc, "com.x", 5, renamed.clone()).unwrap();
    assert_eq!(edited.app("com.x").unwrap().groups[1], renamed);
    assert_eq!(keys(&edited, "com.x"), vec![1, 5]);
}

#[test]
fn test_edit_rejects_key_change_without_mutation() {
    let doc = make_doc();
    let before = doc.clone();
    assert!(matches!(
        edit_group(&doc, "com.x", 5, make_group(6, "popup")),
        Err(EditError::KeyChanged { original: 5, key: 6 })
    ));
    assert_eq!(doc, before);
}

#[test]
fn test_edit_rejects_collision_and_unknown_group() {
    let doc = make_doc();
    assert!(matches!(
        edit_group(&doc, "com.x", 5, make_group(5, "splash")),
        Err(EditError::NameCollision { .. })
    ));
    // Keeping its own name is fine
    assert!(edit_group(&doc, "com.x", 5, make_group(5, "popup")).is_ok());
    assert!(matches!(
        edit_group(&doc, "com.x", 3, make_group(3, "x")),
        Err(EditError::UnknownGroup { key: 3, .. })
    ));
}

#[test]
fn test_delete_group() {
    let doc = make_doc();
    let deleted = delete_group(&doc, "com.x", 1).unwrap();
    assert_eq!(keys(&deleted, "com.x"), vec![5]);
    assert!(matches!(
        delete_group(&doc, "com.x", 2),
        Err(EditError::UnknownGroup { .. })
    ));
}
