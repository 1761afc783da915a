//! Rule compilation and group validity
//!
//! A group is valid when every rule has at least one selector and every
//! selector compiles. Invalid groups are kept in their document and simply
//! never activated.

use taprule_types::{ActionKind, AppRaw, GroupRaw, RuleRaw};

use super::error::RuleCompileError;
use crate::selector::{self, Selector};

/// A rule with its selectors compiled, ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub key: i32,
    /// Position in the owning group
    pub index: usize,
    /// Fallback selectors, tried in order
    pub selectors: Vec<Selector>,
    pub delay_ms: u64,
    pub action: ActionKind,
    pub max_triggers: Option<u32>,
    pub reset_interval_ms: Option<u64>,
    pub action_cd_ms: Option<u64>,
}

impl CompiledRule {
    pub fn compile(index: usize, raw: &RuleRaw) -> Result<Self, RuleCompileError> {
        if raw.matches.is_empty() {
            return Err(RuleCompileError::NoSelectors { rule_key: raw.key });
        }

        let selectors = raw
            .matches
            .iter()
            .map(|text| {
                selector::parse(text).map_err(|source| RuleCompileError::Selector {
                    rule_key: raw.key,
                    text: text.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            key: raw.key,
            index,
            selectors,
            delay_ms: raw.delay_ms(),
            action: raw.action_kind(),
            max_triggers: raw.max_triggers,
            reset_interval_ms: raw.reset_interval,
            action_cd_ms: raw.action_cd,
        })
    }
}

/// Compilation and validity for document groups
pub trait GroupRawExt {
    /// Compile every rule in declaration order. Fails on the first bad rule.
    fn compile(&self) -> Result<Vec<CompiledRule>, RuleCompileError>;

    fn is_valid(&self) -> bool {
        self.compile().is_ok()
    }
}

impl GroupRawExt for GroupRaw {
    fn compile(&self) -> Result<Vec<CompiledRule>, RuleCompileError> {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| CompiledRule::compile(index, rule))
            .collect()
    }
}

pub trait AppRawExt {
    /// Keys of groups that cannot be activated, with the reason
    fn invalid_groups(&self) -> Vec<(i32, RuleCompileError)>;
}

impl AppRawExt for AppRaw {
    fn invalid_groups(&self) -> Vec<(i32, RuleCompileError)> {
        self.groups
            .iter()
            .filter_map(|group| group.compile().err().map(|e| (group.key, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(rules: Vec<RuleRaw>) -> GroupRaw {
        GroupRaw {
            key: 3,
            name: "g".into(),
            desc: None,
            enable: None,
            rules,
        }
    }

    #[test]
    fn compiles_rules_in_order_with_defaults() {
        let mut delayed = RuleRaw::new(5, [r#"[text="Skip"]"#, "Button"]);
        delayed.delay = Some(800);
        delayed.max_triggers = Some(1);
        let g = group(vec![RuleRaw::new(2, ["TextView"]), delayed]);

        let rules = g.compile().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!((rules[0].key, rules[0].index), (2, 0));
        assert_eq!(rules[0].delay_ms, 0);
        assert_eq!(rules[0].action, ActionKind::TapCenter);
        assert_eq!((rules[1].key, rules[1].index), (5, 1));
        assert_eq!(rules[1].selectors.len(), 2);
        assert_eq!(rules[1].delay_ms, 800);
        assert_eq!(rules[1].max_triggers, Some(1));
    }

    #[test]
    fn rule_without_selectors_invalidates_group() {
        let g = group(vec![RuleRaw::new(1, Vec::<String>::new())]);
        assert_eq!(
            g.compile().unwrap_err(),
            RuleCompileError::NoSelectors { rule_key: 1 }
        );
        assert!(!g.is_valid());
    }

    #[test]
    fn bad_selector_invalidates_group() {
        let g = group(vec![RuleRaw::new(0, ["Button"]), RuleRaw::new(1, ["[text>1]"])]);
        let err = g.compile().unwrap_err();
        assert!(matches!(err, RuleCompileError::Selector { rule_key: 1, .. }));
    }

    #[test]
    fn app_lists_invalid_groups() {
        let mut bad = group(vec![RuleRaw::new(0, ["@@"])]);
        bad.key = 9;
        let app = AppRaw {
            id: "com.x".into(),
            name: None,
            groups: vec![group(vec![RuleRaw::new(0, ["A"])]), bad],
        };
        let invalid = app.invalid_groups();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].0, 9);
    }
}
