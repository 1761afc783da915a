//! Subscription document parsing and key-uniqueness checks
//!
//! Documents are JSON with camelCase keys. Every parse entry point checks the
//! same invariants: app ids unique in a document, group keys unique in an
//! app, rule keys unique in a group. Invalid selectors do NOT fail a parse;
//! they only make the owning group invalid (see [`super::GroupRawExt`]).

use std::collections::HashSet;

use taprule_types::{AppRaw, GroupRaw, SubscriptionRaw};

use super::error::DocumentError;

/// Parse and check a full subscription document.
pub fn parse_subscription(text: &str) -> Result<SubscriptionRaw, DocumentError> {
    let doc: SubscriptionRaw =
        serde_json::from_str(text).map_err(|source| DocumentError::Json { source })?;
    validate_subscription(&doc)?;
    Ok(doc)
}

/// Pretty JSON form of a document. Field and list order are preserved.
pub fn stringify(doc: &SubscriptionRaw) -> Result<String, DocumentError> {
    serde_json::to_string_pretty(doc).map_err(|source| DocumentError::Serialize { source })
}

/// Parse a single app payload (`{"id": ..., "groups": [...]}`).
pub fn parse_app_raw(text: &str) -> Result<AppRaw, DocumentError> {
    let app: AppRaw = serde_json::from_str(text).map_err(|source| DocumentError::Json { source })?;
    validate_app(&app)?;
    Ok(app)
}

/// Parse a single group payload (`{"key": ..., "name": ..., "rules": [...]}`).
pub fn parse_group_raw(text: &str) -> Result<GroupRaw, DocumentError> {
    let group: GroupRaw =
        serde_json::from_str(text).map_err(|source| DocumentError::Json { source })?;
    validate_group(&group)?;
    Ok(group)
}

pub fn validate_subscription(doc: &SubscriptionRaw) -> Result<(), DocumentError> {
    let mut app_ids = HashSet::new();
    for app in &doc.apps {
        if !app_ids.insert(app.id.as_str()) {
            return Err(DocumentError::DuplicateApp {
                app_id: app.id.clone(),
            });
        }
        validate_app(app)?;
    }
    Ok(())
}

pub fn validate_app(app: &AppRaw) -> Result<(), DocumentError> {
    let mut keys = HashSet::new();
    for group in &app.groups {
        if !keys.insert(group.key) {
            return Err(DocumentError::DuplicateGroup {
                app_id: app.id.clone(),
                key: group.key,
            });
        }
        validate_group(group)?;
    }
    Ok(())
}

pub fn validate_group(group: &GroupRaw) -> Result<(), DocumentError> {
    let mut keys = HashSet::new();
    for rule in &group.rules {
        if !keys.insert(rule.key) {
            return Err(DocumentError::DuplicateRule {
                group_key: group.key,
                key: rule.key,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taprule_types::{ActionKind, RuleRaw};

    const DOC: &str = r#"{
        "id": 7,
        "version": 3,
        "name": "Skip ads",
        "updateUrl": "https://example.com/subs.json",
        "apps": [
            {
                "id": "com.x",
                "name": "X",
                "groups": [
                    {
                        "key": 0,
                        "name": "splash",
                        "rules": [
                            { "key": 0, "matches": ["[text=\"Skip\"]"], "delay": 500 },
                            { "key": 1, "matches": ["Button[text=\"Close\"]"], "action": "clickNode" }
                        ]
                    },
                    { "key": 4, "name": "popup", "enable": false, "rules": [] }
                ]
            },
            { "id": "com.y", "groups": [] }
        ]
    }"#;

    #[test]
    fn parses_document_with_defaults() {
        let doc = parse_subscription(DOC).unwrap();
        assert_eq!(doc.id, 7);
        assert_eq!(doc.version, 3);
        assert_eq!(doc.apps.len(), 2);

        let app = doc.app("com.x").unwrap();
        assert_eq!(app.max_group_key(), Some(4));
        let splash = app.group(0).unwrap();
        assert!(splash.default_enabled());
        assert_eq!(splash.rules[0].delay_ms(), 500);
        assert_eq!(splash.rules[0].action_kind(), ActionKind::TapCenter);
        assert_eq!(splash.rules[1].action_kind(), ActionKind::TapNode);
        assert!(!app.group(4).unwrap().default_enabled());
    }

    #[test]
    fn stringify_round_trips() {
        let doc = parse_subscription(DOC).unwrap();
        let text = stringify(&doc).unwrap();
        assert_eq!(parse_subscription(&text).unwrap(), doc);
    }

    #[test]
    fn rejects_duplicate_app_ids() {
        let text = r#"{"id":1,"version":1,"apps":[{"id":"a"},{"id":"a"}]}"#;
        assert!(matches!(
            parse_subscription(text),
            Err(DocumentError::DuplicateApp { app_id }) if app_id == "a"
        ));
    }

    #[test]
    fn rejects_duplicate_group_keys() {
        let text = r#"{"id":1,"version":1,"apps":[{"id":"a","groups":[
            {"key":2,"name":"x"},{"key":2,"name":"y"}]}]}"#;
        assert!(matches!(
            parse_subscription(text),
            Err(DocumentError::DuplicateGroup { key: 2, .. })
        ));
    }

    #[test]
    fn rejects_duplicate_rule_keys() {
        let mut group = GroupRaw {
            key: 1,
            name: "g".into(),
            desc: None,
            enable: None,
            rules: vec![RuleRaw::new(0, ["A"]), RuleRaw::new(0, ["B"])],
        };
        assert!(matches!(
            validate_group(&group),
            Err(DocumentError::DuplicateRule { group_key: 1, key: 0 })
        ));

        group.rules[1].key = 1;
        let text = serde_json::to_string(&group).unwrap();
        assert_eq!(parse_group_raw(&text).unwrap(), group);
    }

    #[test]
    fn invalid_selectors_do_not_fail_parsing() {
        let text = r#"{"key":0,"name":"broken","rules":[{"key":0,"matches":["[[["]}]}"#;
        assert!(parse_group_raw(text).is_ok());
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(parse_app_raw("{"), Err(DocumentError::Json { .. })));
    }
}
